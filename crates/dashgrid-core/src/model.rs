//! # Dashboard Model
//!
//! The versioned dashboard document: grid width, widgets and the metadata
//! of the session that wrote it last.

use crate::error::{DashboardError, Result};
use crate::layout::validate_columns;
use crate::primitives::{MAX_SETTINGS, MAX_TITLE_LEN, MAX_WIDGETS};
use crate::types::{Rect, Timestamp, WidgetId, WidgetKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Current document schema version.
///
/// - 1: widgets and columns only
/// - 2: adds `revision` and `session`
pub const SCHEMA_VERSION: u32 = 2;

// =============================================================================
// WIDGET
// =============================================================================

/// A widget placed on the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Widget {
    pub id: WidgetId,
    pub kind: WidgetKind,
    pub title: String,
    pub rect: Rect,
    /// Free-form per-widget configuration (filter, search id, ...).
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Widget {
    #[must_use]
    pub fn new(
        id: WidgetId,
        kind: WidgetKind,
        title: impl Into<String>,
        rect: Rect,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            kind,
            title: title.into(),
            rect,
            settings: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// Metadata about the client session that last wrote the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub device: String,
    pub started_at: Timestamp,
}

impl SessionInfo {
    #[must_use]
    pub fn new(session_id: impl Into<String>, device: impl Into<String>, started_at: Timestamp) -> Self {
        Self {
            session_id: session_id.into(),
            device: device.into(),
            started_at,
        }
    }
}

// =============================================================================
// DASHBOARD STATE
// =============================================================================

/// The full dashboard document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardState {
    pub schema_version: u32,
    pub columns: u32,
    pub widgets: Vec<Widget>,
    #[serde(default)]
    pub next_widget_id: u64,
    #[serde(default)]
    pub session: Option<SessionInfo>,
    pub updated_at: Timestamp,
    /// Number of mutations applied. Breaks ties between equal timestamps.
    #[serde(default)]
    pub revision: u64,
}

impl DashboardState {
    /// Create an empty dashboard. Fails when `columns` is out of range.
    pub fn new(columns: u32) -> Result<Self> {
        validate_columns(columns)?;
        Ok(Self {
            schema_version: SCHEMA_VERSION,
            columns,
            widgets: Vec::new(),
            next_widget_id: 0,
            session: None,
            updated_at: Timestamp::ZERO,
            revision: 0,
        })
    }

    #[must_use]
    pub fn widget(&self, id: WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.id == id)
    }

    pub(crate) fn widget_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.id == id)
    }

    /// Rectangles of all widgets, paired with their ids.
    pub fn rects(&self) -> impl Iterator<Item = (WidgetId, Rect)> + '_ {
        self.widgets.iter().map(|w| (w.id, w.rect))
    }

    #[must_use]
    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    /// Number of rows the layout occupies.
    #[must_use]
    pub fn height(&self) -> u32 {
        crate::layout::bottom(self.widgets.iter().map(|w| &w.rect))
    }

    /// Whether `self` should win over `other` under last-writer-wins.
    ///
    /// Later `updated_at` wins; equal timestamps fall back to `revision`.
    #[must_use]
    pub fn is_newer_than(&self, other: &DashboardState) -> bool {
        (self.updated_at, self.revision) > (other.updated_at, other.revision)
    }

    /// Check every structural invariant of the document.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(DashboardError::InvalidState(format!(
                "schema version {} is not current",
                self.schema_version
            )));
        }
        validate_columns(self.columns)?;

        if self.widgets.len() > MAX_WIDGETS {
            return Err(DashboardError::TooManyWidgets(MAX_WIDGETS));
        }

        let mut seen = BTreeSet::new();
        for widget in &self.widgets {
            if !seen.insert(widget.id) {
                return Err(DashboardError::InvalidState(format!(
                    "duplicate widget id {}",
                    widget.id
                )));
            }
            if widget.id.0 >= self.next_widget_id {
                return Err(DashboardError::InvalidState(format!(
                    "widget id {} is not below next id {}",
                    widget.id, self.next_widget_id
                )));
            }
            if widget.title.len() > MAX_TITLE_LEN {
                return Err(DashboardError::InvalidState(format!(
                    "title of widget {} is too long",
                    widget.id
                )));
            }
            if widget.settings.len() > MAX_SETTINGS {
                return Err(DashboardError::InvalidState(format!(
                    "widget {} has too many settings",
                    widget.id
                )));
            }
            if !widget.rect.fits(self.columns) {
                return Err(DashboardError::OutOfBounds {
                    rect: widget.rect,
                    columns: self.columns,
                });
            }
        }

        for (i, a) in self.widgets.iter().enumerate() {
            for b in self.widgets.iter().skip(i + 1) {
                if a.rect.overlaps(&b.rect) {
                    return Err(DashboardError::Collision {
                        rect: a.rect,
                        with: b.id,
                    });
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

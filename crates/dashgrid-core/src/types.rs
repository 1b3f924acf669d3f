//! # Types
//!
//! Identifiers, timestamps and grid geometry shared by every module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DashboardError;
use crate::primitives::{MAX_ROWS, MAX_WIDGET_HEIGHT};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a widget, unique within one dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WidgetId(pub u64);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Milliseconds since the Unix epoch.
///
/// The engine never creates these on its own; callers pass them in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The zero timestamp, used for documents that were never written.
    pub const ZERO: Timestamp = Timestamp(0);

    #[must_use]
    pub fn millis(self) -> u64 {
        self.0
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Top-left corner of a widget, in grid cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    #[must_use]
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Width and height of a widget, in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    #[must_use]
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }
}

/// A rectangle on the grid.
///
/// Covers columns `x..x + w` and rows `y..y + h` (half-open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    #[must_use]
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    #[must_use]
    pub fn at(position: Position, size: Size) -> Self {
        Self::new(position.x, position.y, size.w, size.h)
    }

    #[must_use]
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    /// Exclusive bottom edge.
    #[must_use]
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Whether two rectangles share at least one cell.
    ///
    /// Touching edges do not count, and an empty rectangle overlaps nothing.
    #[must_use]
    pub fn overlaps(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Whether the rectangle is non-empty, no taller than
    /// `MAX_WIDGET_HEIGHT`, and lies inside a grid of `columns` by
    /// `MAX_ROWS`.
    #[must_use]
    pub fn fits(&self, columns: u32) -> bool {
        !self.is_empty()
            && self.h <= MAX_WIDGET_HEIGHT
            && self.right() <= columns
            && self.bottom() <= MAX_ROWS
    }
}

// =============================================================================
// WIDGET CATALOG
// =============================================================================

/// Kinds of widget a dashboard can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetKind {
    TaskList,
    SavedSearch,
    Calendar,
    Stats,
    Notes,
    Activity,
}

impl WidgetKind {
    /// All kinds, in catalog order.
    pub const ALL: [WidgetKind; 6] = [
        WidgetKind::TaskList,
        WidgetKind::SavedSearch,
        WidgetKind::Calendar,
        WidgetKind::Stats,
        WidgetKind::Notes,
        WidgetKind::Activity,
    ];

    /// Size used when a widget is added without an explicit size.
    #[must_use]
    pub fn default_size(self) -> Size {
        match self {
            WidgetKind::TaskList => Size::new(4, 6),
            WidgetKind::SavedSearch => Size::new(4, 4),
            WidgetKind::Calendar => Size::new(6, 5),
            WidgetKind::Stats => Size::new(3, 2),
            WidgetKind::Notes => Size::new(3, 3),
            WidgetKind::Activity => Size::new(4, 5),
        }
    }

    /// Smallest size the widget can be resized to.
    #[must_use]
    pub fn min_size(self) -> Size {
        match self {
            WidgetKind::TaskList => Size::new(2, 3),
            WidgetKind::SavedSearch => Size::new(2, 2),
            WidgetKind::Calendar => Size::new(3, 3),
            WidgetKind::Stats => Size::new(1, 1),
            WidgetKind::Notes => Size::new(2, 2),
            WidgetKind::Activity => Size::new(2, 3),
        }
    }

    /// Title shown when the caller does not supply one.
    #[must_use]
    pub fn default_title(self) -> &'static str {
        match self {
            WidgetKind::TaskList => "Tasks",
            WidgetKind::SavedSearch => "Saved search",
            WidgetKind::Calendar => "Calendar",
            WidgetKind::Stats => "Stats",
            WidgetKind::Notes => "Notes",
            WidgetKind::Activity => "Activity",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WidgetKind::TaskList => "task-list",
            WidgetKind::SavedSearch => "saved-search",
            WidgetKind::Calendar => "calendar",
            WidgetKind::Stats => "stats",
            WidgetKind::Notes => "notes",
            WidgetKind::Activity => "activity",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WidgetKind {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WidgetKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| DashboardError::UnknownWidgetKind(s.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_rects() {
        let a = Rect::new(0, 0, 4, 4);
        let b = Rect::new(3, 3, 2, 2);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = Rect::new(0, 0, 4, 4);
        assert!(!a.overlaps(&Rect::new(4, 0, 2, 2)));
        assert!(!a.overlaps(&Rect::new(0, 4, 2, 2)));
    }

    #[test]
    fn empty_rect_never_overlaps() {
        let a = Rect::new(0, 0, 4, 4);
        assert!(!a.overlaps(&Rect::new(1, 1, 0, 2)));
        assert!(!Rect::new(1, 1, 2, 0).overlaps(&a));
    }

    #[test]
    fn fits_checks_right_edge() {
        assert!(Rect::new(8, 0, 4, 1).fits(12));
        assert!(!Rect::new(9, 0, 4, 1).fits(12));
        assert!(!Rect::new(0, 0, 0, 1).fits(12));
    }

    #[test]
    fn fits_checks_height_and_last_row() {
        assert!(Rect::new(0, 0, 12, MAX_WIDGET_HEIGHT).fits(12));
        assert!(!Rect::new(0, 0, 12, MAX_WIDGET_HEIGHT + 1).fits(12));
        assert!(Rect::new(0, MAX_ROWS - 2, 1, 2).fits(12));
        assert!(!Rect::new(0, MAX_ROWS - 1, 1, 2).fits(12));
        assert!(!Rect::new(0, u32::MAX, 1, 1).fits(12));
    }

    #[test]
    fn kind_parses_from_str() {
        for kind in WidgetKind::ALL {
            assert_eq!(kind.as_str().parse::<WidgetKind>().ok(), Some(kind));
        }
        assert!("gauge".parse::<WidgetKind>().is_err());
    }

    #[test]
    fn min_size_never_exceeds_default() {
        for kind in WidgetKind::ALL {
            let min = kind.min_size();
            let default = kind.default_size();
            assert!(min.w <= default.w && min.h <= default.h, "{kind}");
        }
    }
}

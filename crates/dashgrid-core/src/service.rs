//! # Dashboard Service
//!
//! Widget operations on a [`DashboardState`].
//!
//! Every successful mutation stamps `updated_at` with the caller's clock and
//! bumps `revision`. A failed operation leaves the document untouched.

use crate::error::{DashboardError, Result};
use crate::layout::{self, clamp_size, collides, find_position, validate_columns};
use crate::model::{DashboardState, SessionInfo, Widget};
use crate::primitives::{MAX_SETTINGS, MAX_TITLE_LEN, MAX_WIDGETS};
use crate::types::{Position, Rect, Size, Timestamp, WidgetId, WidgetKind};
use std::collections::BTreeMap;

/// Owns a dashboard document and applies widget operations to it.
#[derive(Debug, Clone)]
pub struct DashboardService {
    state: DashboardState,
}

impl DashboardService {
    /// Start with an empty dashboard of `columns` columns.
    pub fn new(columns: u32) -> Result<Self> {
        Ok(Self {
            state: DashboardState::new(columns)?,
        })
    }

    /// Wrap an existing document after validating it.
    pub fn from_state(state: DashboardState) -> Result<Self> {
        state.validate()?;
        Ok(Self { state })
    }

    #[must_use]
    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> DashboardState {
        self.state
    }

    /// Record the session that is editing this dashboard.
    ///
    /// The session travels with the next write; attaching it alone is not a
    /// mutation.
    pub fn attach_session(&mut self, session: SessionInfo) {
        self.state.session = Some(session);
    }

    // =========================================================================
    // WIDGETS
    // =========================================================================

    /// Add a widget at the first free position.
    ///
    /// `size` defaults to the kind's catalog size and is clamped to the
    /// kind's minimum and the grid width.
    pub fn add_widget(
        &mut self,
        kind: WidgetKind,
        title: Option<&str>,
        size: Option<Size>,
        now: Timestamp,
    ) -> Result<WidgetId> {
        self.ensure_capacity()?;
        let title = checked_title(title.unwrap_or(kind.default_title()))?;

        let size = clamp_size(
            size.unwrap_or(kind.default_size()),
            kind.min_size(),
            self.state.columns,
        );
        let existing: Vec<Rect> = self.state.widgets.iter().map(|w| w.rect).collect();
        let position = find_position(&existing, size, self.state.columns)?;

        Ok(self.insert(kind, title, Rect::at(position, size), now))
    }

    /// Add a widget at an explicit rectangle.
    pub fn add_widget_at(
        &mut self,
        kind: WidgetKind,
        title: Option<&str>,
        rect: Rect,
        now: Timestamp,
    ) -> Result<WidgetId> {
        self.ensure_capacity()?;
        let title = checked_title(title.unwrap_or(kind.default_title()))?;
        self.check_free(&rect, None)?;

        Ok(self.insert(kind, title, rect, now))
    }

    /// Remove a widget and return it.
    pub fn remove_widget(&mut self, id: WidgetId, now: Timestamp) -> Result<Widget> {
        let index = self
            .state
            .widgets
            .iter()
            .position(|w| w.id == id)
            .ok_or(DashboardError::WidgetNotFound(id))?;

        let widget = self.state.widgets.remove(index);
        self.touch(now);
        Ok(widget)
    }

    /// Move a widget, keeping its size.
    pub fn move_widget(&mut self, id: WidgetId, to: Position, now: Timestamp) -> Result<()> {
        let current = self.require(id)?.rect;
        let rect = Rect::at(to, current.size());
        self.check_free(&rect, Some(id))?;

        self.apply_rect(id, rect, now)
    }

    /// Resize a widget in place, keeping its top-left corner.
    ///
    /// The size is clamped to the kind's minimum and the grid width. Returns
    /// the size that was applied.
    pub fn resize_widget(&mut self, id: WidgetId, size: Size, now: Timestamp) -> Result<Size> {
        let widget = self.require(id)?;
        let size = clamp_size(size, widget.kind.min_size(), self.state.columns);
        let rect = Rect::at(widget.rect.position(), size);
        self.check_free(&rect, Some(id))?;

        self.apply_rect(id, rect, now)?;
        Ok(size)
    }

    /// Change a widget's title and/or replace its settings.
    pub fn update_widget(
        &mut self,
        id: WidgetId,
        title: Option<&str>,
        settings: Option<BTreeMap<String, String>>,
        now: Timestamp,
    ) -> Result<()> {
        let title = title.map(checked_title).transpose()?;
        if let Some(settings) = &settings {
            if settings.len() > MAX_SETTINGS {
                return Err(DashboardError::InvalidState(format!(
                    "at most {MAX_SETTINGS} settings per widget"
                )));
            }
        }

        let widget = self
            .state
            .widget_mut(id)
            .ok_or(DashboardError::WidgetNotFound(id))?;
        if let Some(title) = title {
            widget.title = title;
        }
        if let Some(settings) = settings {
            widget.settings = settings;
        }
        widget.updated_at = now;
        self.touch(now);
        Ok(())
    }

    // =========================================================================
    // LAYOUT
    // =========================================================================

    /// Change the grid width and reflow the layout.
    ///
    /// Widgets are revisited in `(y, x, id)` order. A widget keeps its
    /// rectangle when it still fits and does not collide with widgets already
    /// re-seated; otherwise its width is clamped and it is placed again with
    /// the first-fit search. Returns the number of widgets that moved.
    pub fn set_columns(&mut self, columns: u32, now: Timestamp) -> Result<usize> {
        validate_columns(columns)?;

        let mut order: Vec<usize> = (0..self.state.widgets.len()).collect();
        order.sort_by_key(|&i| {
            let w = &self.state.widgets[i];
            (w.rect.y, w.rect.x, w.id)
        });

        let mut seated: Vec<Rect> = Vec::with_capacity(order.len());
        let mut next_rects = vec![Rect::new(0, 0, 0, 0); self.state.widgets.len()];
        let mut moved = 0;

        for i in order {
            let widget = &self.state.widgets[i];
            let rect = widget.rect;
            let keeps_place =
                rect.fits(columns) && !seated.iter().any(|other| other.overlaps(&rect));

            let placed = if keeps_place {
                rect
            } else {
                let size = clamp_size(rect.size(), widget.kind.min_size(), columns);
                let position = find_position(&seated, size, columns)?;
                moved += 1;
                Rect::at(position, size)
            };
            seated.push(placed);
            next_rects[i] = placed;
        }

        for (widget, rect) in self.state.widgets.iter_mut().zip(next_rects) {
            if widget.rect != rect {
                widget.rect = rect;
                widget.updated_at = now;
            }
        }
        self.state.columns = columns;
        self.touch(now);
        Ok(moved)
    }

    /// Pull every widget up into free space. Returns the number moved.
    pub fn compact(&mut self, now: Timestamp) -> usize {
        let before: Vec<Rect> = self.state.widgets.iter().map(|w| w.rect).collect();
        let moved = layout::compact(&mut self.state.widgets);
        if moved > 0 {
            for (widget, old) in self.state.widgets.iter_mut().zip(before) {
                if widget.rect != old {
                    widget.updated_at = now;
                }
            }
            self.touch(now);
        }
        moved
    }

    /// Drop every widget and start over with `columns` columns.
    ///
    /// The id counter keeps counting so ids are never reused.
    pub fn reset(&mut self, columns: u32, now: Timestamp) -> Result<()> {
        validate_columns(columns)?;
        self.state.widgets.clear();
        self.state.columns = columns;
        self.touch(now);
        Ok(())
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn require(&self, id: WidgetId) -> Result<&Widget> {
        self.state
            .widget(id)
            .ok_or(DashboardError::WidgetNotFound(id))
    }

    fn ensure_capacity(&self) -> Result<()> {
        if self.state.widgets.len() >= MAX_WIDGETS {
            return Err(DashboardError::TooManyWidgets(MAX_WIDGETS));
        }
        Ok(())
    }

    fn check_free(&self, rect: &Rect, ignore: Option<WidgetId>) -> Result<()> {
        if !rect.fits(self.state.columns) {
            return Err(DashboardError::OutOfBounds {
                rect: *rect,
                columns: self.state.columns,
            });
        }
        if let Some(with) = collides(self.state.rects(), rect, ignore) {
            return Err(DashboardError::Collision { rect: *rect, with });
        }
        Ok(())
    }

    fn insert(&mut self, kind: WidgetKind, title: String, rect: Rect, now: Timestamp) -> WidgetId {
        let id = WidgetId(self.state.next_widget_id);
        self.state.next_widget_id = self.state.next_widget_id.saturating_add(1);
        self.state
            .widgets
            .push(Widget::new(id, kind, title, rect, now));
        self.touch(now);
        id
    }

    fn apply_rect(&mut self, id: WidgetId, rect: Rect, now: Timestamp) -> Result<()> {
        let widget = self
            .state
            .widget_mut(id)
            .ok_or(DashboardError::WidgetNotFound(id))?;
        widget.rect = rect;
        widget.updated_at = now;
        self.touch(now);
        Ok(())
    }

    /// Record a write that changes no widget, such as an import.
    ///
    /// `updated_at` never moves backwards, even if the caller's clock does.
    pub fn touch(&mut self, now: Timestamp) {
        self.state.updated_at = self.state.updated_at.max(now);
        self.state.revision = self.state.revision.saturating_add(1);
    }
}

fn checked_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.len() > MAX_TITLE_LEN {
        return Err(DashboardError::InvalidState(format!(
            "title longer than {MAX_TITLE_LEN} bytes"
        )));
    }
    Ok(title.to_string())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{MAX_ROWS, MAX_WIDGET_HEIGHT};

    fn service() -> DashboardService {
        DashboardService::new(12).expect("valid columns")
    }

    fn add(svc: &mut DashboardService, w: u32, h: u32) -> WidgetId {
        svc.add_widget(WidgetKind::Stats, None, Some(Size::new(w, h)), Timestamp(1))
            .expect("placement")
    }

    #[test]
    fn add_widget_auto_places_without_overlap() {
        let mut svc = service();
        let a = add(&mut svc, 6, 2);
        let b = add(&mut svc, 6, 2);
        let c = add(&mut svc, 6, 2);

        let state = svc.state();
        assert_eq!(state.widget(a).map(|w| w.rect), Some(Rect::new(0, 0, 6, 2)));
        assert_eq!(state.widget(b).map(|w| w.rect), Some(Rect::new(6, 0, 6, 2)));
        assert_eq!(state.widget(c).map(|w| w.rect), Some(Rect::new(0, 2, 6, 2)));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn add_widget_uses_catalog_defaults() {
        let mut svc = service();
        let id = svc
            .add_widget(WidgetKind::Calendar, None, None, Timestamp(1))
            .expect("placement");
        let widget = svc.state().widget(id).cloned();
        assert_eq!(widget.as_ref().map(|w| w.rect.size()), Some(Size::new(6, 5)));
        assert_eq!(widget.map(|w| w.title), Some("Calendar".to_string()));
    }

    #[test]
    fn add_widget_clamps_to_grid_width() {
        let mut svc = DashboardService::new(4).expect("valid columns");
        let id = add(&mut svc, 10, 1);
        assert_eq!(svc.state().widget(id).map(|w| w.rect.w), Some(4));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut svc = service();
        let a = add(&mut svc, 1, 1);
        svc.remove_widget(a, Timestamp(2)).expect("remove");
        let b = add(&mut svc, 1, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn add_widget_at_rejects_collision() {
        let mut svc = service();
        let a = add(&mut svc, 4, 4);
        let result = svc.add_widget_at(WidgetKind::Stats, None, Rect::new(2, 2, 2, 2), Timestamp(2));
        assert!(matches!(result, Err(DashboardError::Collision { with, .. }) if with == a));
    }

    #[test]
    fn move_widget_rejects_collision_and_keeps_state() {
        let mut svc = service();
        let a = add(&mut svc, 4, 2);
        let b = add(&mut svc, 4, 2);
        let before = svc.state().clone();

        let result = svc.move_widget(b, Position::new(2, 0), Timestamp(5));
        assert!(matches!(result, Err(DashboardError::Collision { with, .. }) if with == a));
        assert_eq!(svc.state(), &before);
    }

    #[test]
    fn move_widget_onto_own_footprint_is_allowed() {
        let mut svc = service();
        let a = add(&mut svc, 4, 2);
        assert!(svc.move_widget(a, Position::new(1, 0), Timestamp(5)).is_ok());
        assert_eq!(svc.state().widget(a).map(|w| w.rect.x), Some(1));
    }

    #[test]
    fn move_widget_out_of_bounds_fails() {
        let mut svc = service();
        let a = add(&mut svc, 4, 2);
        let result = svc.move_widget(a, Position::new(9, 0), Timestamp(5));
        assert!(matches!(result, Err(DashboardError::OutOfBounds { .. })));
    }

    #[test]
    fn move_widget_below_last_row_fails() {
        let mut svc = service();
        let a = add(&mut svc, 4, 2);
        let before = svc.state().clone();
        let result = svc.move_widget(a, Position::new(0, 400_000_000), Timestamp(5));
        assert!(matches!(result, Err(DashboardError::OutOfBounds { .. })));
        let result = svc.move_widget(a, Position::new(0, MAX_ROWS - 1), Timestamp(5));
        assert!(matches!(result, Err(DashboardError::OutOfBounds { .. })));
        assert_eq!(svc.state(), &before);

        svc.move_widget(a, Position::new(0, MAX_ROWS - 2), Timestamp(6))
            .expect("last rows are on the grid");
        assert_eq!(svc.compact(Timestamp(7)), 1);
        assert_eq!(svc.state().widget(a).map(|w| w.rect.y), Some(0));
    }

    #[test]
    fn add_widget_at_rejects_oversized_rect() {
        let mut svc = service();
        let tall = Rect::new(0, 0, 2, MAX_WIDGET_HEIGHT + 1);
        let deep = Rect::new(0, MAX_ROWS, 2, 1);
        for rect in [tall, deep] {
            let result = svc.add_widget_at(WidgetKind::Notes, None, rect, Timestamp(1));
            assert!(matches!(result, Err(DashboardError::OutOfBounds { .. })));
        }
        assert!(svc.state().is_empty());
        assert_eq!(svc.state().revision, 0);
    }

    #[test]
    fn resize_clamps_to_minimum() {
        let mut svc = service();
        let id = svc
            .add_widget(WidgetKind::TaskList, None, None, Timestamp(1))
            .expect("placement");
        let applied = svc.resize_widget(id, Size::new(1, 1), Timestamp(2));
        assert_eq!(applied.ok(), Some(WidgetKind::TaskList.min_size()));
    }

    #[test]
    fn mutations_stamp_time_and_revision() {
        let mut svc = service();
        add(&mut svc, 1, 1);
        assert_eq!(svc.state().updated_at, Timestamp(1));
        assert_eq!(svc.state().revision, 1);

        // A clock that goes backwards does not rewind the document.
        svc.compact(Timestamp(0));
        let id = add(&mut svc, 1, 1);
        svc.update_widget(id, Some("Renamed"), None, Timestamp(0))
            .expect("update");
        assert_eq!(svc.state().updated_at, Timestamp(1));
        assert_eq!(svc.state().revision, 3);
    }

    #[test]
    fn update_widget_replaces_settings() {
        let mut svc = service();
        let id = add(&mut svc, 2, 2);
        let mut settings = BTreeMap::new();
        settings.insert("search".to_string(), "open bugs".to_string());

        svc.update_widget(id, None, Some(settings.clone()), Timestamp(3))
            .expect("update");
        assert_eq!(svc.state().widget(id).map(|w| w.settings.clone()), Some(settings));
    }

    #[test]
    fn set_columns_reflows_widgets_that_no_longer_fit() {
        let mut svc = service();
        let a = add(&mut svc, 6, 2);
        let b = add(&mut svc, 6, 2);

        let moved = svc.set_columns(8, Timestamp(9)).expect("reflow");
        assert_eq!(moved, 1);
        let state = svc.state();
        assert_eq!(state.columns, 8);
        assert_eq!(state.widget(a).map(|w| w.rect), Some(Rect::new(0, 0, 6, 2)));
        assert_eq!(state.widget(b).map(|w| w.rect), Some(Rect::new(0, 2, 6, 2)));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn set_columns_clamps_wide_widgets() {
        let mut svc = service();
        let id = add(&mut svc, 12, 1);
        svc.set_columns(4, Timestamp(2)).expect("reflow");
        assert_eq!(svc.state().widget(id).map(|w| w.rect), Some(Rect::new(0, 0, 4, 1)));
    }

    #[test]
    fn set_columns_rejects_invalid_width() {
        let mut svc = service();
        assert!(matches!(
            svc.set_columns(0, Timestamp(2)),
            Err(DashboardError::InvalidColumns(0))
        ));
    }

    #[test]
    fn set_columns_without_room_leaves_document_unchanged() {
        // Full-height widgets in the left half, separated by gaps one row
        // too short for another of them.
        let mut svc = service();
        let stride = 2 * MAX_WIDGET_HEIGHT - 1;
        let mut y = MAX_WIDGET_HEIGHT - 1;
        while y + MAX_WIDGET_HEIGHT <= MAX_ROWS {
            svc.add_widget_at(
                WidgetKind::Notes,
                None,
                Rect::new(0, y, 6, MAX_WIDGET_HEIGHT),
                Timestamp(1),
            )
            .expect("left column");
            y += stride;
        }
        // The right-half widget sorts last and must be re-placed at 6 columns.
        svc.add_widget_at(
            WidgetKind::Notes,
            None,
            Rect::new(6, MAX_ROWS - MAX_WIDGET_HEIGHT, 6, MAX_WIDGET_HEIGHT),
            Timestamp(1),
        )
        .expect("right column");

        let before = svc.state().clone();
        assert!(matches!(
            svc.set_columns(6, Timestamp(50)),
            Err(DashboardError::NoSpace)
        ));
        assert_eq!(svc.state(), &before);
        assert_eq!(svc.state().columns, 12);
    }

    #[test]
    fn compact_closes_gaps_after_removal() {
        let mut svc = service();
        let a = add(&mut svc, 12, 2);
        let b = add(&mut svc, 12, 2);
        svc.remove_widget(a, Timestamp(2)).expect("remove");

        assert_eq!(svc.compact(Timestamp(3)), 1);
        assert_eq!(svc.state().widget(b).map(|w| w.rect.y), Some(0));
    }

    #[test]
    fn too_many_widgets() {
        let mut svc = DashboardService::new(48).expect("valid columns");
        for _ in 0..MAX_WIDGETS {
            add(&mut svc, 1, 1);
        }
        let result = svc.add_widget(WidgetKind::Stats, None, None, Timestamp(1));
        assert!(matches!(result, Err(DashboardError::TooManyWidgets(_))));
    }

    #[test]
    fn from_state_rejects_invalid_document() {
        let mut state = DashboardState::new(12).expect("valid columns");
        state.columns = 99;
        assert!(DashboardService::from_state(state).is_err());
    }
}

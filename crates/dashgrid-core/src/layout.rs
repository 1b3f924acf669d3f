//! # Layout Engine
//!
//! Grid placement for dashboard widgets.
//!
//! The grid is `columns` cells wide and [`MAX_ROWS`] cells tall. Widgets are
//! axis-aligned rectangles of whole cells and must never share a cell.
//!
//! Placement is first-fit in row-major order: rows top to bottom, and
//! within a row, columns left to right. The first position where the new
//! rectangle overlaps nothing wins. The result depends only on the input,
//! so two replicas placing the same widget agree on where it goes.
//!
//! The topmost free row is always row 0 or the bottom edge of some widget,
//! and within that row the leftmost free column is 0 or the right edge of
//! some widget. The search only visits those candidates, so its cost
//! depends on the widget count and never on coordinates.

use crate::error::{DashboardError, Result};
use crate::model::Widget;
use crate::primitives::{MAX_COLUMNS, MAX_ROWS, MAX_WIDGET_HEIGHT, MIN_COLUMNS};
use crate::types::{Position, Rect, Size, WidgetId};

// =============================================================================
// VALIDATION
// =============================================================================

/// Check a column count against the engine limits.
pub fn validate_columns(columns: u32) -> Result<()> {
    if (MIN_COLUMNS..=MAX_COLUMNS).contains(&columns) {
        Ok(())
    } else {
        Err(DashboardError::InvalidColumns(columns))
    }
}

/// Clamp a requested size to a widget's minimum and the grid width.
///
/// Width is clamped to `[min.w, columns]`; when the minimum is wider than
/// the grid, the grid width wins. Height is clamped to
/// `[min.h, MAX_WIDGET_HEIGHT]`.
#[must_use]
pub fn clamp_size(size: Size, min: Size, columns: u32) -> Size {
    let w = size.w.max(min.w).max(1).min(columns.max(1));
    let h = size.h.max(min.h).max(1).min(MAX_WIDGET_HEIGHT);
    Size::new(w, h)
}

// =============================================================================
// COLLISION SEARCH
// =============================================================================

/// Find the first placed rectangle that overlaps `candidate`.
///
/// The widget named by `ignore` is skipped, which is how a widget is
/// checked against everything except its own current position.
pub fn collides<I>(placed: I, candidate: &Rect, ignore: Option<WidgetId>) -> Option<WidgetId>
where
    I: IntoIterator<Item = (WidgetId, Rect)>,
{
    placed
        .into_iter()
        .filter(|(id, _)| Some(*id) != ignore)
        .find(|(_, rect)| rect.overlaps(candidate))
        .map(|(id, _)| id)
}

/// First row below every rectangle.
#[must_use]
pub fn bottom<'a, I>(rects: I) -> u32
where
    I: IntoIterator<Item = &'a Rect>,
{
    rects.into_iter().map(Rect::bottom).max().unwrap_or(0)
}

/// Sorted, deduplicated edge candidates: 0 plus one edge per rectangle.
fn edges<F>(existing: &[Rect], edge: F) -> Vec<u32>
where
    F: Fn(&Rect) -> u32,
{
    let mut out: Vec<u32> = std::iter::once(0).chain(existing.iter().map(edge)).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Find the first free position for a widget of `size`.
///
/// Returns the topmost, then leftmost, position whose rectangle overlaps
/// none of `existing` and stays inside the grid. `NoSpace` means the
/// rectangle would have to extend below [`MAX_ROWS`].
///
/// `size` must already fit the grid (see [`clamp_size`]).
pub fn find_position(existing: &[Rect], size: Size, columns: u32) -> Result<Position> {
    validate_columns(columns)?;

    let shape = Rect::new(0, 0, size.w, size.h);
    if !shape.fits(columns) {
        return Err(DashboardError::OutOfBounds {
            rect: shape,
            columns,
        });
    }

    let last_x = columns - size.w;
    let last_y = MAX_ROWS - size.h;
    let xs: Vec<u32> = edges(existing, Rect::right)
        .into_iter()
        .take_while(|&x| x <= last_x)
        .collect();

    for y in edges(existing, Rect::bottom) {
        if y > last_y {
            break;
        }
        for &x in &xs {
            let candidate = Rect::new(x, y, size.w, size.h);
            if !existing.iter().any(|rect| rect.overlaps(&candidate)) {
                return Ok(Position::new(x, y));
            }
        }
    }

    Err(DashboardError::NoSpace)
}

// =============================================================================
// COMPACTION
// =============================================================================

/// Move every widget up as far as it can go.
///
/// Widgets settle in `(y, x, id)` order. Each one rises until it rests on
/// the lowest settled widget above it that shares a column, or reaches row
/// 0. Columns and sizes never change. Returns the number of widgets that
/// moved.
pub fn compact(widgets: &mut [Widget]) -> usize {
    let mut order: Vec<usize> = (0..widgets.len()).collect();
    order.sort_by_key(|&i| (widgets[i].rect.y, widgets[i].rect.x, widgets[i].id));

    let mut settled: Vec<Rect> = Vec::with_capacity(widgets.len());
    let mut moved = 0;

    for i in order {
        let rect = widgets[i].rect;
        let resting_y = settled
            .iter()
            .filter(|other| other.x < rect.right() && rect.x < other.right())
            .map(Rect::bottom)
            .filter(|&b| b <= rect.y)
            .max()
            .unwrap_or(0);

        let landed = Rect { y: resting_y, ..rect };
        if landed.y != rect.y {
            widgets[i].rect = landed;
            moved += 1;
        }
        settled.push(landed);
    }

    moved
}

// =============================================================================
// TESTS
// =============================================================================

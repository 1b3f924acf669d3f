//! # Primitives
//!
//! Hard limits of the engine. Every loop and every accepted document is
//! bounded by one of these values.

/// Smallest accepted grid width.
pub const MIN_COLUMNS: u32 = 1;

/// Largest accepted grid width.
pub const MAX_COLUMNS: u32 = 48;

/// Grid width of a freshly created dashboard.
pub const DEFAULT_COLUMNS: u32 = 12;

/// Maximum number of widgets on one dashboard.
pub const MAX_WIDGETS: usize = 256;

/// Maximum height of a single widget, in rows.
pub const MAX_WIDGET_HEIGHT: u32 = 64;

/// Height of the grid, in rows. No widget may extend below it.
///
/// `MAX_WIDGETS` widgets of `MAX_WIDGET_HEIGHT` stacked on top of each other
/// fill it exactly.
pub const MAX_ROWS: u32 = MAX_WIDGETS as u32 * MAX_WIDGET_HEIGHT;

/// Maximum length of a widget title, in bytes.
pub const MAX_TITLE_LEN: usize = 120;

/// Maximum number of settings entries on one widget.
pub const MAX_SETTINGS: usize = 64;

//! # Errors
//!
//! Every fallible engine operation returns [`DashboardError`].

use crate::types::{Rect, WidgetId};
use thiserror::Error;

/// Errors produced by the dashboard engine.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("widget {0} not found")]
    WidgetNotFound(WidgetId),

    #[error("rectangle {rect:?} collides with widget {with}")]
    Collision { rect: Rect, with: WidgetId },

    #[error("rectangle {rect:?} is outside the {columns}-column grid")]
    OutOfBounds { rect: Rect, columns: u32 },

    #[error("column count {0} out of valid range")]
    InvalidColumns(u32),

    #[error("dashboard already holds the maximum of {0} widgets")]
    TooManyWidgets(usize),

    #[error("no free position left on the grid")]
    NoSpace,

    #[error("unknown widget kind: {0}")]
    UnknownWidgetKind(String),

    #[error("invalid dashboard state: {0}")]
    InvalidState(String),

    #[error("unsupported schema version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid document format: {0}")]
    InvalidFormat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

// redb splits its errors by operation; all of them are storage failures here.
macro_rules! storage_error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for DashboardError {
                fn from(err: $ty) -> Self {
                    DashboardError::Storage(err.to_string())
                }
            }
        )*
    };
}

storage_error_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, DashboardError>;

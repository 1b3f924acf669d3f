//! App-level errors.

use dashgrid_core::DashboardError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Dashboard(#[from] DashboardError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("remote holds a newer dashboard")]
    StaleWrite,

    #[error("no remote configured")]
    NoRemote,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("no dashboard found")]
    NotInitialized,
}

impl AppError {
    /// Whether the error means "remote unreachable right now".
    ///
    /// Transient errors send writes to the offline queue instead of failing.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            AppError::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

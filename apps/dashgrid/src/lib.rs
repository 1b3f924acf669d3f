//! # dashgrid Library
//!
//! This library exposes the dashgrid app modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod remote;
pub mod storage;
pub mod sync;

// Re-export dashgrid_core for convenience
pub use dashgrid_core;

pub use error::{AppError, AppResult};

use dashgrid_core::Timestamp;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as an engine timestamp.
///
/// The core never reads the clock; every timestamp it sees comes from here.
pub fn now() -> Timestamp {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    Timestamp(u64::try_from(millis).unwrap_or(u64::MAX))
}

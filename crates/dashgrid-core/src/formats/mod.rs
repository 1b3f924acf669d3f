//! # Formats Module
//!
//! Encodings of the dashboard document.
//!
//! This module contains:
//! - The versioned JSON document (file store, in-memory store, HTTP)
//! - The binary envelope (postcard + header) used by the key-value store
//!   and by exports
//! - Export checksums
//!
//! Note: file I/O stays in the app layer. This module only converts between
//! bytes and [`crate::DashboardState`].

mod persistence;

pub use persistence::*;

//! # dashgrid-core
//!
//! Deterministic layout and state engine for dashgrid dashboards.
//!
//! This crate contains everything that does not need I/O beyond a local
//! key-value file:
//!
//! - [`layout`]: the grid placement engine (collision search, compaction)
//! - [`model`]: the versioned dashboard document
//! - [`service`]: widget operations on top of the document
//! - [`formats`]: JSON document and binary envelope encodings
//! - [`storage`]: the [`DashboardStore`] trait plus in-memory and redb stores
//! - [`sync`]: last-writer-wins reconciliation and the offline queue
//!
//! ## Rules
//!
//! - `BTreeMap` only, so iteration order is stable.
//! - Integer arithmetic only.
//! - The engine never reads the wall clock. Every mutating operation takes a
//!   [`Timestamp`] from the caller.

pub mod error;
pub mod formats;
pub mod layout;
pub mod model;
pub mod primitives;
pub mod service;
pub mod storage;
pub mod sync;
pub mod types;

pub use error::{DashboardError, Result};
pub use layout::{bottom, clamp_size, collides, compact, find_position};
pub use model::{DashboardState, SCHEMA_VERSION, SessionInfo, Widget};
pub use service::DashboardService;
pub use storage::{DashboardStore, MemoryStore, RedbStore};
pub use sync::{OfflineQueue, PendingWrite, SyncDecision, reconcile};
pub use types::{Position, Rect, Size, Timestamp, WidgetId, WidgetKind};

//! # Storage Module
//!
//! Persistence backends for the dashboard document.
//!
//! Every backend implements [`DashboardStore`], which holds exactly one
//! dashboard. Backends in this crate:
//!
//! - [`MemoryStore`]: string key/value map holding the JSON document, the
//!   same shape a browser's local storage would hold
//! - [`RedbStore`]: embedded key-value database (ACID, crash safe), one
//!   binary envelope per dashboard name
//!
//! The file and remote HTTP backends live in the app crate, since they need
//! filesystem and network access.

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::error::Result;
use crate::model::DashboardState;

/// A place a single dashboard document can be loaded from and saved to.
pub trait DashboardStore {
    /// Load the stored document, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<DashboardState>>;

    /// Replace the stored document.
    fn save(&mut self, state: &DashboardState) -> Result<()>;

    /// Remove the stored document. Clearing an empty store is not an error.
    fn clear(&mut self) -> Result<()>;

    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;
}

impl<S: DashboardStore + ?Sized> DashboardStore for Box<S> {
    fn load(&self) -> Result<Option<DashboardState>> {
        (**self).load()
    }

    fn save(&mut self, state: &DashboardState) -> Result<()> {
        (**self).save(state)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

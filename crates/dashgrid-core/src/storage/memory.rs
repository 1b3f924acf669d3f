//! In-memory store shaped like browser local storage.

use super::DashboardStore;
use crate::error::Result;
use crate::formats::{from_json, to_json_string};
use crate::model::DashboardState;
use std::collections::BTreeMap;

/// Prefix of every key written by the store.
pub const KEY_PREFIX: &str = "dashgrid:";

/// String key/value store holding JSON documents.
///
/// Several dashboards can share one map; each store instance reads and writes
/// the key `dashgrid:<dashboard>`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    key: String,
}

impl MemoryStore {
    #[must_use]
    pub fn new(dashboard: &str) -> Self {
        Self {
            entries: BTreeMap::new(),
            key: format!("{KEY_PREFIX}{dashboard}"),
        }
    }

    /// The key this store reads and writes.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw JSON held under this store's key.
    #[must_use]
    pub fn raw(&self) -> Option<&str> {
        self.entries.get(&self.key).map(String::as_str)
    }

    /// Put an arbitrary string under a key, bypassing encoding.
    pub fn set_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// All keys currently held, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl DashboardStore for MemoryStore {
    fn load(&self) -> Result<Option<DashboardState>> {
        self.raw().map(|raw| from_json(raw.as_bytes())).transpose()
    }

    fn save(&mut self, state: &DashboardState) -> Result<()> {
        state.validate()?;
        let json = to_json_string(state)?;
        self.entries.insert(self.key.clone(), json);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.remove(&self.key);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.key)
    }
}

//! redb-backed key-value store.
//!
//! One table, `dashboards`, maps a dashboard name to its binary envelope.
//! Each save is a single write transaction, so a crash leaves either the old
//! or the new document on disk.

use super::DashboardStore;
use crate::error::Result;
use crate::formats::{decode_binary, encode_binary};
use crate::model::DashboardState;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableError};
use std::path::Path;
use std::sync::Arc;

const DASHBOARDS: TableDefinition<&str, &[u8]> = TableDefinition::new("dashboards");

/// Dashboard store on an embedded redb database.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
    dashboard: String,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("dashboard", &self.dashboard)
            .finish()
    }
}

impl RedbStore {
    /// Open (or create) the database at `path` and bind to `dashboard`.
    pub fn open(path: &Path, dashboard: &str) -> Result<Self> {
        let db = Database::create(path)?;

        // Create the table up front so readers never see it missing.
        let txn = db.begin_write()?;
        txn.open_table(DASHBOARDS)?;
        txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            dashboard: dashboard.to_string(),
        })
    }

    /// Another store on the same database, bound to a different dashboard.
    #[must_use]
    pub fn for_dashboard(&self, dashboard: &str) -> Self {
        Self {
            db: Arc::clone(&self.db),
            dashboard: dashboard.to_string(),
        }
    }

    #[must_use]
    pub fn dashboard(&self) -> &str {
        &self.dashboard
    }

    /// Names of every dashboard in the database, in order.
    pub fn list_dashboards(&self) -> Result<Vec<String>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(DASHBOARDS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            names.push(key.value().to_string());
        }
        Ok(names)
    }
}

impl DashboardStore for RedbStore {
    fn load(&self) -> Result<Option<DashboardState>> {
        let txn = self.db.begin_read()?;
        let table = match txn.open_table(DASHBOARDS) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match table.get(self.dashboard.as_str())? {
            Some(bytes) => decode_binary(bytes.value()).map(Some),
            None => Ok(None),
        }
    }

    fn save(&mut self, state: &DashboardState) -> Result<()> {
        state.validate()?;
        let bytes = encode_binary(state)?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DASHBOARDS)?;
            table.insert(self.dashboard.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DASHBOARDS)?;
            table.remove(self.dashboard.as_str())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("redb:{}", self.dashboard)
    }
}

//! # Local Storage
//!
//! The file-backed store and backend selection.
//!
//! The file backend keeps one JSON document per dashboard. The default
//! dashboard lives at the configured path itself (`dashgrid.json`); any
//! other dashboard sits beside it with its name before the extension
//! (`dashgrid.work.json`).
//!
//! File I/O lives here rather than in dashgrid-core; the core only turns
//! documents into bytes and back.

use crate::config::{Backend, Config, DEFAULT_DASHBOARD, is_dashboard_name};
use crate::error::AppResult;
use dashgrid_core::formats::{from_json, to_json};
use dashgrid_core::{DashboardError, DashboardState, DashboardStore, RedbStore};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Boxed store as used by the CLI and the server.
pub type BoxedStore = Box<dyn DashboardStore + Send>;

/// JSON document on disk.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so readers never see a half-written document.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `dashboard`, laid out next to `base`.
    pub fn for_dashboard(base: &Path, dashboard: &str) -> Self {
        Self::new(dashboard_path(base, dashboard))
    }

    /// Names of the dashboards stored next to `base`, sorted.
    pub fn list_dashboards(base: &Path) -> dashgrid_core::Result<Vec<String>> {
        let Some(base_name) = base.file_name().and_then(|n| n.to_str()) else {
            return Ok(Vec::new());
        };
        let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or(base_name);
        let prefix = format!("{stem}.");
        let suffix = base
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        let dir = base
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut names = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            let os_name = entry.file_name();
            let Some(file_name) = os_name.to_str() else {
                continue;
            };
            if file_name == base_name {
                names.insert(DEFAULT_DASHBOARD.to_string());
                continue;
            }
            let name = file_name
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_suffix(suffix.as_str()))
                .filter(|name| is_dashboard_name(name));
            if let Some(name) = name {
                names.insert(name.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// `dashgrid.json` for the default dashboard, `dashgrid.<name>.json` for the
/// rest.
fn dashboard_path(base: &Path, dashboard: &str) -> PathBuf {
    if dashboard == DEFAULT_DASHBOARD {
        return base.to_path_buf();
    }
    let mut name = base.file_stem().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(dashboard);
    if let Some(ext) = base.extension() {
        name.push(".");
        name.push(ext);
    }
    base.with_file_name(name)
}

fn io_err(err: std::io::Error) -> DashboardError {
    DashboardError::Storage(err.to_string())
}

impl DashboardStore for FileStore {
    fn load(&self) -> dashgrid_core::Result<Option<DashboardState>> {
        match fs::read(&self.path) {
            Ok(bytes) => from_json(&bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    fn save(&mut self, state: &DashboardState) -> dashgrid_core::Result<()> {
        state.validate()?;
        let bytes = to_json(state)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let temp = self.temp_path();
        fs::write(&temp, &bytes).map_err(io_err)?;
        fs::rename(&temp, &self.path).map_err(io_err)?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "dashboard written");
        Ok(())
    }

    fn clear(&mut self) -> dashgrid_core::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Open the local store selected by `config`.
pub fn open_store(config: &Config) -> AppResult<BoxedStore> {
    let store: BoxedStore = match config.backend {
        Backend::File => Box::new(FileStore::for_dashboard(&config.db_path, &config.dashboard)),
        Backend::Redb => {
            if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            Box::new(RedbStore::open(&config.db_path, &config.dashboard)?)
        }
    };
    debug!(store = %store.describe(), "local store opened");
    Ok(store)
}

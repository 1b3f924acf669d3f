//! # Configuration
//!
//! Settings are resolved in three layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. environment variables (`DASHGRID_*`)
//! 3. command-line flags (applied by `main.rs` through [`Overrides`])
//!
//! | Variable | Meaning | Default |
//! | --- | --- | --- |
//! | `DASHGRID_BACKEND` | `file` or `redb` | `file` |
//! | `DASHGRID_DB` | database / document path | `dashgrid.json` or `dashgrid.redb` |
//! | `DASHGRID_DASHBOARD` | dashboard name | `default` |
//! | `DASHGRID_REMOTE` | base URL of the remote endpoint | none |
//! | `DASHGRID_API_KEY` | bearer key (server and client) | none |
//! | `DASHGRID_BIND` | server listen address | `127.0.0.1:8787` |
//! | `DASHGRID_DEVICE` | device name recorded in the session | `cli` |
//! | `DASHGRID_RATE_LIMIT` | server requests per second, `0` disables | `50` |

use crate::error::{AppError, AppResult};
use dashgrid_core::primitives::DEFAULT_COLUMNS;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
pub const DEFAULT_DASHBOARD: &str = "default";
pub const DEFAULT_RATE_LIMIT: u32 = 50;

/// Local storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// One JSON document per file.
    File,
    /// Embedded redb key-value database.
    Redb,
}

impl Backend {
    #[must_use]
    pub fn default_path(self) -> PathBuf {
        match self {
            Backend::File => PathBuf::from("dashgrid.json"),
            Backend::Redb => PathBuf::from("dashgrid.redb"),
        }
    }
}

impl FromStr for Backend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" | "json" => Ok(Backend::File),
            "redb" | "kv" => Ok(Backend::Redb),
            other => Err(AppError::Config(format!(
                "unknown backend '{other}' (expected 'file' or 'redb')"
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::File => f.write_str("file"),
            Backend::Redb => f.write_str("redb"),
        }
    }
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub backend: Backend,
    pub db_path: PathBuf,
    pub dashboard: String,
    pub remote_url: Option<String>,
    pub api_key: Option<String>,
    pub bind: String,
    pub device: String,
    pub columns: u32,
    /// Requests per second accepted by the server; `0` disables limiting.
    pub rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            db_path: Backend::File.default_path(),
            dashboard: DEFAULT_DASHBOARD.to_string(),
            remote_url: None,
            api_key: None,
            bind: DEFAULT_BIND.to_string(),
            device: "cli".to_string(),
            columns: DEFAULT_COLUMNS,
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

/// Values given on the command line. `None` keeps the lower layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<String>,
    pub db_path: Option<PathBuf>,
    pub dashboard: Option<String>,
    pub remote_url: Option<String>,
    pub api_key: Option<String>,
    pub bind: Option<String>,
}

impl Config {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = non_empty("DASHGRID_BACKEND") {
            config.backend = backend.parse()?;
        }
        config.db_path = non_empty("DASHGRID_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| config.backend.default_path());
        if let Some(dashboard) = non_empty("DASHGRID_DASHBOARD") {
            config.dashboard = dashboard;
        }
        config.remote_url = non_empty("DASHGRID_REMOTE").map(|url| trim_url(&url));
        config.api_key = non_empty("DASHGRID_API_KEY");
        if let Some(bind) = non_empty("DASHGRID_BIND") {
            config.bind = bind;
        }
        if let Some(device) = non_empty("DASHGRID_DEVICE") {
            config.device = device;
        }
        if let Some(limit) = non_empty("DASHGRID_RATE_LIMIT") {
            config.rate_limit = limit.trim().parse().map_err(|_| {
                AppError::Config(format!("DASHGRID_RATE_LIMIT must be a number, got '{limit}'"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply command-line values on top of this configuration.
    pub fn apply(mut self, overrides: Overrides) -> AppResult<Self> {
        let path_was_default = self.db_path == self.backend.default_path();

        if let Some(backend) = overrides.backend {
            self.backend = backend.parse()?;
            if path_was_default {
                self.db_path = self.backend.default_path();
            }
        }
        if let Some(path) = overrides.db_path {
            self.db_path = path;
        }
        if let Some(dashboard) = overrides.dashboard {
            self.dashboard = dashboard;
        }
        if let Some(url) = overrides.remote_url {
            self.remote_url = Some(trim_url(&url));
        }
        if let Some(key) = overrides.api_key {
            self.api_key = Some(key);
        }
        if let Some(bind) = overrides.bind {
            self.bind = bind;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> AppResult<()> {
        if !is_dashboard_name(&self.dashboard) {
            return Err(AppError::Config(format!(
                "dashboard name '{}' may only contain letters, digits, '-' and '_'",
                self.dashboard
            )));
        }
        if let Some(url) = &self.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::Config(format!(
                    "remote URL '{url}' must start with http:// or https://"
                )));
            }
        }
        Ok(())
    }
}

/// Dashboard names are non-empty and use only letters, digits, `-` and `_`,
/// so they are safe inside file names and never contain a `.`.
#[must_use]
pub fn is_dashboard_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn trim_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

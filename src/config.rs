//! Configuration loading and validation.
//!
//! Settings live in a TOML file inside the `.quickfind` directory. Missing
//! fields fall back to defaults and out-of-range values are clamped on load,
//! so a hand-edited file can never wedge the monitor.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;
use crate::monitor::{MonitorOptions, ReconcileOptions, ScanOptions};

/// Name of the TOML settings file inside the application directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

const MIN_POLL_INTERVAL_SECS: u64 = 1;
const MIN_DEBOUNCE_WINDOW_MS: u64 = 50;
const MAX_DELETE_BATCH: usize = 900;

/// Errors raised while reading or writing the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No application directory was available.
    #[error("Application directory unavailable: {0}")]
    AppDir(#[from] app_dirs::AppDirError),
    /// The settings file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The settings file could not be written.
    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The settings file is not valid TOML for this schema.
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Settings could not be rendered to TOML.
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Aggregate settings loaded from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Synchronization engine settings.
    #[serde(default)]
    pub monitor: MonitorSettings,
}

/// Tunables for the synchronization engine, as stored in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between scan cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Milliseconds of quiet before a change burst is reconciled.
    #[serde(default = "default_debounce_window_ms")]
    pub debounce_window_ms: u64,
    /// Index entries whose name starts with a dot.
    #[serde(default)]
    pub include_hidden: bool,
    /// Paths per DELETE statement during reconciliation.
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            debounce_window_ms: default_debounce_window_ms(),
            include_hidden: false,
            delete_batch_size: default_delete_batch_size(),
        }
    }
}

impl MonitorSettings {
    /// Clamp out-of-range values into the supported ranges.
    pub fn normalized(self) -> Self {
        Self {
            poll_interval_secs: self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS),
            debounce_window_ms: self.debounce_window_ms.max(MIN_DEBOUNCE_WINDOW_MS),
            include_hidden: self.include_hidden,
            delete_batch_size: self.delete_batch_size.clamp(1, MAX_DELETE_BATCH),
        }
    }

    /// Convert the stored form into the monitor's runtime options.
    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            debounce_window: Duration::from_millis(self.debounce_window_ms),
            scan: self.scan_options(),
            reconcile: self.reconcile_options(),
        }
    }

    /// Scanner options derived from these settings.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            include_hidden: self.include_hidden,
        }
    }

    /// Reconciler options derived from these settings.
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            delete_batch_size: self.delete_batch_size,
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_debounce_window_ms() -> u64 {
    5_000
}

fn default_delete_batch_size() -> usize {
    500
}

/// Resolve the configuration file path inside the application directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from the default location, returning defaults when the
/// file does not exist yet.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    load_from(&config_path()?)
}

/// Load configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: AppConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(AppConfig {
        monitor: config.monitor.normalized(),
    })
}

/// Write configuration to an explicit path.
pub fn save_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

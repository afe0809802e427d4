//! Engine configuration
//!
//! Loadable from TOML:
//!
//! ```toml
//! data_dir = "./linkdeck-data"
//! toast_capacity = 64
//!
//! [checker]
//! timeout_ms = 6000
//!
//! [checker.mode]
//! mode = "relay"
//! base_url = "http://localhost:5173"
//! ```

use std::path::{Path, PathBuf};

use linkdeck_linkcheck::CheckerConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`Linkdeck`](crate::Linkdeck) engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the local key/value files
    pub data_dir: PathBuf,
    /// Flush every local write to disk before notifying
    pub sync_writes: bool,
    /// Toast broadcast channel capacity
    pub toast_capacity: usize,
    /// Reachability checker settings
    pub checker: CheckerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./linkdeck-data"),
            sync_writes: true,
            toast_capacity: 64,
            checker: CheckerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Set the checker configuration
    pub fn with_checker(mut self, checker: CheckerConfig) -> Self {
        self.checker = checker;
        self
    }

    /// Set the toast channel capacity
    pub fn with_toast_capacity(mut self, capacity: usize) -> Self {
        self.toast_capacity = capacity;
        self
    }

    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    /// Parse a TOML document
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }
}

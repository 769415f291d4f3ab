//! Configuration for the registry importer.

use std::time::Duration;

use serde::Deserialize;

use regsync_core::config;
use regsync_graph::GraphConfig;

use crate::error::Result;

/// Importer configuration.
///
/// Loaded from the `regsync.toml` `[import]` section or
/// `REGSYNC__IMPORT__` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportConfig {
    #[serde(default)]
    pub lock: LockConfig,
}

/// The named lock serializing concurrent imports.
#[derive(Debug, Clone, Deserialize)]
pub struct LockConfig {
    /// Whether imports take the lock at all (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lock name shared by every importer (default: "registry_import").
    #[serde(default = "default_lock_name")]
    pub name: String,

    /// Seconds to wait for the lock before giving up (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_lock_name() -> String {
    "registry_import".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            name: default_lock_name(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Everything the binary reads from configuration.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub import: ImportConfig,
    pub neo4j: GraphConfig,
}

impl Settings {
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::load(file_prefix)?;
        Ok(Self {
            import: config::section(&cfg, "import")?,
            neo4j: config::section(&cfg, "neo4j")?,
        })
    }
}

//! Configuration management for regsync services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`REGSYNC__` prefix, `__` between path segments,
//!    e.g. `REGSYNC__NEO4J__URI`)
//! 2. Config file (`regsync.toml`, or the prefix given on the command line)
//! 3. Defaults

use serde::de::DeserializeOwned;

use crate::error::RegsyncError;

pub const ENV_PREFIX: &str = "REGSYNC";

/// Build the layered configuration. A missing config file is not an error.
pub fn load(file_prefix: &str) -> Result<config::Config, RegsyncError> {
    config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| RegsyncError::Config(e.to_string()))
}

/// Deserialize one `[section]`, falling back to defaults when it is absent.
pub fn section<T>(cfg: &config::Config, key: &str) -> Result<T, RegsyncError>
where
    T: DeserializeOwned + Default,
{
    match cfg.get::<T>(key) {
        Ok(value) => Ok(value),
        Err(config::ConfigError::NotFound(_)) => {
            tracing::debug!(section = key, "Config section absent, using defaults");
            Ok(T::default())
        }
        Err(e) => Err(RegsyncError::Config(format!("[{key}]: {e}"))),
    }
}

//! Error types for the regsync-import crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Organization with inn {inn} already exists")]
    AlreadyExists { inn: String },

    #[error("Invalid payload: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] regsync_graph::GraphError),

    #[error("Timed out after {timeout_secs}s waiting for lock '{name}'")]
    LockTimeout { name: String, timeout_secs: u64 },

    #[error("Config error: {0}")]
    Config(#[from] regsync_core::RegsyncError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

use thiserror::Error;

/// Top-level error type for shared regsync concerns.
#[derive(Error, Debug)]
pub enum RegsyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

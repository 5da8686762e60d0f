//! Common error types for the survey data processor

use thiserror::Error;

/// Common result type for storage and configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised below the pipeline stage boundary
#[derive(Error, Debug)]
pub enum Error {
    /// Store query or connection failure (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure (config file, export directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON document could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored value did not have the expected shape
    #[error("Corrupt stored value: {0}")]
    CorruptValue(String),
}

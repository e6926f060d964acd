//! Error types for rolodex_core.

use thiserror::Error;

/// Result type alias using the core error.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core store operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// SQLite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

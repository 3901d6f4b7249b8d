//! Error types for the mirror store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error (creating the cache directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A row that cannot be turned back into a typed value.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Another thread panicked while holding the connection.
    #[error("store connection lock poisoned")]
    Poisoned,
}

//! Error types for the engine.

use crate::overrides::OverrideError;
use crate::remote::RemoteError;
use aclmirror_store::StoreError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in engine operations.
///
/// Bulk paths record per-item errors in their report and keep going; only the
/// single-target operations surface these to the caller directly.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A permission name missing from the permission table.
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    /// An identifier without the remote's id shape.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A name reference that matches nothing in the batch or the workspace.
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    /// An import payload over the per-call cap.
    #[error("too many {what} (max {limit}, got {count})")]
    ImportLimit {
        what: &'static str,
        count: usize,
        limit: usize,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0} is not a category")]
    NotACategory(String),

    #[error("{0} is not inside a category")]
    NotInCategory(String),

    #[error("parent category of {0} not found")]
    ParentNotCategory(String),

    /// Threads and other container kinds that carry no synced overrides.
    #[error("container type cannot be synced: {0}")]
    NotSyncable(String),

    /// The remote rejected or failed a call.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("override error: {0}")]
    Override(#[from] OverrideError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<aclmirror_types::Error> for EngineError {
    fn from(e: aclmirror_types::Error) -> Self {
        match e {
            aclmirror_types::Error::UnknownPermission(name) => EngineError::UnknownPermission(name),
            other => EngineError::Validation(other.to_string()),
        }
    }
}

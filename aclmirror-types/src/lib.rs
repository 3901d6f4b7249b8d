//! Core type definitions for the access-control mirror.
//!
//! This crate defines the plain data shared by the cache and the engine:
//! - Identifiers for containers, principal groups, principals and workspaces
//! - The static permission table and the `u128` permission bitset
//! - Containers, principal groups and principals as the remote reports them
//! - Access overrides in raw (remote) and typed form
//! - Push events emitted by the remote platform
//!
//! Nothing here performs I/O.

mod container;
mod event;
mod group;
mod ids;
mod overwrite;
mod permissions;

pub use container::{Container, ContainerKind};
pub use event::{PushAction, PushEntity, PushEvent};
pub use group::{Principal, PrincipalGroup};
pub use ids::{is_snowflake, ContainerId, GroupId, PrincipalId, WorkspaceId};
pub use overwrite::{AccessOverride, OverrideKind, PermissionSpec, RawOverride};
pub use permissions::{Permission, Permissions, PERMISSION_TABLE_VERSION};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while interpreting remote or user-supplied values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    #[error("invalid permission bitset: {0}")]
    InvalidBitset(String),

    #[error("unknown container kind: {0}")]
    UnknownKind(String),

    #[error("unknown override kind: {0}")]
    UnknownOverrideKind(String),
}

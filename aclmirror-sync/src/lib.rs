//! Access-control mirror engine.
//!
//! Keeps a remote permission platform's per-container override lists
//! consistent across a category/child hierarchy, mirrors the workspace's
//! groups and containers into a local cache, and runs bulk structural
//! changes (import, role assignment, mass deletion) with bounded concurrency
//! and per-item failure isolation.
//!
//! # Architecture
//!
//! - [`overrides`]: canonical form, equality and merge of override lists
//! - [`applier`] / [`orchestrator`]: push a category's overrides to children
//! - [`maintainer`]: full reconcile and push-event upkeep of the cache
//! - [`pool`]: the bounded runner behind [`import`]
//! - [`engine::MirrorEngine`]: the facade tying it together

pub mod applier;
pub mod assign;
pub mod config;
pub mod deleter;
pub mod engine;
pub mod error;
pub mod export;
pub mod import;
pub mod maintainer;
pub mod orchestrator;
pub mod overrides;
pub mod pool;
pub mod remote;
pub mod report;

pub use applier::{ApplyOutcome, ApplyReason, OverrideApplier};
pub use assign::{parse_principal_ids, AssignAction, AssignReport, RoleAssigner};
pub use config::EngineConfig;
pub use deleter::{DeleteReport, MassDeleter};
pub use engine::MirrorEngine;
pub use error::{EngineError, EngineResult};
pub use export::{ExportArtifacts, MemberExporter};
pub use import::{ImportPayload, ImportReport, Importer};
pub use maintainer::{
    EventDisposition, MirrorMaintainer, MirrorNotice, Subscription, SyncOutcome, SyncPhase,
    SyncStats,
};
pub use orchestrator::{ChannelSyncReport, HierarchySync, SyncMode, SyncReport};
pub use overrides::{canonicalize, merge_overrides, overrides_equal, CanonicalOverrides, OverrideError};
pub use pool::{run_bounded, PoolFailure};
pub use remote::{
    ContainerPatch, GroupPatch, Hierarchy, NewContainer, NewGroup, PushEventSource, RemoteError,
    RemoteErrorKind, RemotePlatform, RemoteResult,
};
pub use report::{Failure, FailureList};

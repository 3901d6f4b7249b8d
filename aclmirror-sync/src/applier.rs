//! Reconciles one container's overrides against a desired canonical list.

use crate::error::{EngineError, EngineResult};
use crate::overrides::{canonicalize, overrides_equal, CanonicalOverrides};
use crate::remote::RemotePlatform;
use aclmirror_types::ContainerId;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Why an apply did or did not touch the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyReason {
    AlreadyMatches,
    WouldChange,
    Updated,
}

impl fmt::Display for ApplyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyReason::AlreadyMatches => "already_matches",
            ApplyReason::WouldChange => "would_change",
            ApplyReason::Updated => "updated",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub changed: bool,
    pub reason: ApplyReason,
}

/// Applies desired override lists to containers, one container at a time.
#[derive(Clone)]
pub struct OverrideApplier {
    remote: Arc<dyn RemotePlatform>,
}

impl OverrideApplier {
    pub fn new(remote: Arc<dyn RemotePlatform>) -> Self {
        Self { remote }
    }

    /// Brings `container_id`'s overrides to exactly `desired`.
    ///
    /// The container is fetched fresh on every call, so a second apply of the
    /// same list is a no-op. With `dry_run` the remote is never written.
    pub async fn apply(
        &self,
        container_id: &ContainerId,
        desired: &CanonicalOverrides,
        dry_run: bool,
    ) -> EngineResult<ApplyOutcome> {
        let container = self
            .remote
            .fetch_container(container_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("container {container_id}")))?;
        let current = canonicalize(&container.overrides)?;

        if overrides_equal(&current, desired) {
            return Ok(ApplyOutcome {
                changed: false,
                reason: ApplyReason::AlreadyMatches,
            });
        }
        if dry_run {
            return Ok(ApplyOutcome {
                changed: true,
                reason: ApplyReason::WouldChange,
            });
        }

        self.remote
            .set_overrides(container_id, desired.as_slice())
            .await?;
        debug!(container = %container_id, entries = desired.len(), "overrides updated");
        Ok(ApplyOutcome {
            changed: true,
            reason: ApplyReason::Updated,
        })
    }
}

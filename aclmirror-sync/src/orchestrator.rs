//! Category-to-children override propagation.
//!
//! A category's overrides are the template for every direct child. In
//! `Replace` mode a child ends up with exactly the category's list; in `Merge`
//! mode the category's entries are upserted into the child's own list.

use crate::applier::{ApplyReason, OverrideApplier};
use crate::error::{EngineError, EngineResult};
use crate::overrides::{canonicalize, merge_overrides, CanonicalOverrides};
use crate::remote::RemotePlatform;
use crate::report::{Failure, FailureList};
use aclmirror_types::{Container, ContainerId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How a category's overrides combine with a child's own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// The child gets exactly the category's list.
    #[default]
    Replace,
    /// The category's entries are upserted into the child's list.
    Merge,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncMode::Replace => "replace",
            SyncMode::Merge => "merge",
        })
    }
}

impl FromStr for SyncMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(SyncMode::Replace),
            "merge" => Ok(SyncMode::Merge),
            other => Err(EngineError::Validation(format!("unknown sync mode: {other}"))),
        }
    }
}

/// Result of syncing every child of one category.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub category: ContainerId,
    pub mode: SyncMode,
    pub dry_run: bool,
    /// Direct children, including skipped ones.
    pub total: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: FailureList,
}

/// Result of syncing a single container from its category.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSyncReport {
    pub changed: bool,
    pub reason: ApplyReason,
    pub category: ContainerId,
    pub container: ContainerId,
    pub desired: CanonicalOverrides,
}

/// Drives the applier across a category's children.
pub struct HierarchySync {
    remote: Arc<dyn RemotePlatform>,
    applier: OverrideApplier,
    pace_delay: Duration,
    failure_limit: usize,
}

impl HierarchySync {
    pub fn new(remote: Arc<dyn RemotePlatform>, pace_delay: Duration, failure_limit: usize) -> Self {
        Self {
            applier: OverrideApplier::new(Arc::clone(&remote)),
            remote,
            pace_delay,
            failure_limit,
        }
    }

    async fn fetch_existing(&self, id: &ContainerId) -> EngineResult<Container> {
        self.remote
            .fetch_container(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("container {id}")))
    }

    /// Propagates the category's overrides to each direct child in turn.
    ///
    /// Child categories and threads are skipped. A failing child is recorded
    /// and the rest still run.
    pub async fn sync_category(
        &self,
        category_id: &ContainerId,
        mode: SyncMode,
        dry_run: bool,
    ) -> EngineResult<SyncReport> {
        let category = self.fetch_existing(category_id).await?;
        if !category.kind.is_category() {
            return Err(EngineError::NotACategory(category.label()));
        }
        let template = canonicalize(&category.overrides)?;

        let snapshot = self.remote.fetch_hierarchy().await?;
        let mut children: Vec<Container> = snapshot
            .containers
            .into_iter()
            .filter(|c| c.parent_id.as_ref() == Some(category_id))
            .collect();
        children.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));

        info!(
            category = %category_id,
            children = children.len(),
            %mode,
            dry_run,
            "category sync started"
        );

        let mut report = SyncReport {
            category: category_id.clone(),
            mode,
            dry_run,
            total: children.len(),
            updated: 0,
            unchanged: 0,
            skipped: 0,
            failed: 0,
            failures: FailureList::new(self.failure_limit),
        };

        let mut first = true;
        for child in &children {
            if child.kind.is_category() || child.kind.is_thread() {
                report.skipped += 1;
                continue;
            }
            if !first && !self.pace_delay.is_zero() {
                debug!(delay_ms = self.pace_delay.as_millis() as u64, "pacing");
                tokio::time::sleep(self.pace_delay).await;
            }
            first = false;

            match self.sync_child(child, &template, mode, dry_run).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.unchanged += 1,
                Err(e) => {
                    warn!(container = %child.id, error = %e, "child sync failed");
                    report.failed += 1;
                    report.failures.push(Failure::new(child.label(), failure_message(&e)));
                }
            }
        }

        info!(
            category = %category_id,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            failed = report.failed,
            "category sync finished"
        );
        Ok(report)
    }

    async fn sync_child(
        &self,
        child: &Container,
        template: &CanonicalOverrides,
        mode: SyncMode,
        dry_run: bool,
    ) -> EngineResult<bool> {
        let desired = desired_for(child, template, mode)?;
        let outcome = self.applier.apply(&child.id, &desired, dry_run).await?;
        Ok(outcome.changed)
    }

    /// Syncs one container from its parent category.
    pub async fn sync_channel(
        &self,
        container_id: &ContainerId,
        mode: SyncMode,
        dry_run: bool,
    ) -> EngineResult<ChannelSyncReport> {
        let container = self.fetch_existing(container_id).await?;
        if container.kind.is_thread() || container.kind.is_category() {
            return Err(EngineError::NotSyncable(container.label()));
        }
        let parent_id = container
            .parent_id
            .clone()
            .ok_or_else(|| EngineError::NotInCategory(container.label()))?;
        let parent = self
            .remote
            .fetch_container(&parent_id)
            .await?
            .filter(|p| p.kind.is_category())
            .ok_or_else(|| EngineError::ParentNotCategory(container.label()))?;

        let template = canonicalize(&parent.overrides)?;
        let desired = desired_for(&container, &template, mode)?;
        let outcome = self.applier.apply(container_id, &desired, dry_run).await?;
        info!(
            container = %container_id,
            category = %parent_id,
            %mode,
            reason = %outcome.reason,
            "channel sync finished"
        );

        Ok(ChannelSyncReport {
            changed: outcome.changed,
            reason: outcome.reason,
            category: parent_id,
            container: container_id.clone(),
            desired,
        })
    }
}

fn desired_for(
    child: &Container,
    template: &CanonicalOverrides,
    mode: SyncMode,
) -> EngineResult<CanonicalOverrides> {
    Ok(match mode {
        SyncMode::Replace => template.clone(),
        SyncMode::Merge => merge_overrides(&canonicalize(&child.overrides)?, template),
    })
}

/// Remote failures report the remote's own text.
pub(crate) fn failure_message(e: &EngineError) -> String {
    match e {
        EngineError::Remote(remote) => remote.message.clone(),
        other => other.to_string(),
    }
}

//! Workspace-wide deletion of containers or groups.
//!
//! Containers go leaves first: every non-category, then each category after
//! a fresh fetch. Groups go lowest rank first, never touching the everyone
//! group or managed groups. Both finish with a full reconcile.

use crate::error::EngineResult;
use crate::maintainer::{MirrorMaintainer, SyncOutcome};
use crate::orchestrator::failure_message;
use crate::remote::RemotePlatform;
use crate::report::{Failure, FailureList};
use aclmirror_types::{Container, PrincipalGroup};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

const DELETE_CONTAINERS_REASON: &str = "Danger Zone: delete all channels";
const DELETE_GROUPS_REASON: &str = "Danger Zone: delete all roles";

#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub failures: FailureList,
}

impl DeleteReport {
    fn new(cap: usize) -> Self {
        Self {
            deleted: 0,
            failed: 0,
            skipped: 0,
            failures: FailureList::new(cap),
        }
    }

    fn fail(&mut self, item: String, message: String) {
        self.failed += 1;
        self.failures.push(Failure::new(item, message));
    }
}

pub struct MassDeleter {
    remote: Arc<dyn RemotePlatform>,
    maintainer: Arc<MirrorMaintainer>,
    failure_limit: usize,
}

impl MassDeleter {
    pub fn new(remote: Arc<dyn RemotePlatform>, maintainer: Arc<MirrorMaintainer>, failure_limit: usize) -> Self {
        Self {
            remote,
            maintainer,
            failure_limit,
        }
    }

    /// Deletes every container in the workspace.
    pub async fn delete_all_containers(&self) -> EngineResult<DeleteReport> {
        let snapshot = self.remote.fetch_hierarchy().await?;
        let (categories, leaves): (Vec<Container>, Vec<Container>) = snapshot
            .containers
            .into_iter()
            .filter(|c| !c.kind.is_thread())
            .partition(|c| c.kind.is_category());

        info!(
            containers = leaves.len(),
            categories = categories.len(),
            "deleting all containers"
        );
        let mut report = DeleteReport::new(self.failure_limit);

        for container in &leaves {
            match self.remote.delete_container(&container.id, DELETE_CONTAINERS_REASON).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(container = %container.id, error = %e, "container delete failed");
                    report.fail(container.label(), e.message);
                }
            }
        }

        for category in &categories {
            let fresh = match self.remote.fetch_container(&category.id).await {
                Ok(Some(fresh)) => fresh,
                Ok(None) => continue,
                Err(e) => {
                    report.fail(category.label(), e.message);
                    continue;
                }
            };
            match self.remote.delete_container(&fresh.id, DELETE_CONTAINERS_REASON).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(container = %fresh.id, error = %e, "category delete failed");
                    report.fail(fresh.label(), e.message);
                }
            }
        }

        info!(deleted = report.deleted, failed = report.failed, "container deletion finished");
        self.resync("delete_containers").await;
        Ok(report)
    }

    /// Deletes every deletable group, lowest position first.
    pub async fn delete_all_groups(&self) -> EngineResult<DeleteReport> {
        let snapshot = self.remote.fetch_hierarchy().await?;
        let everyone = self.remote.workspace_id().everyone_group();
        let mut groups: Vec<PrincipalGroup> = snapshot
            .groups
            .into_iter()
            .filter(|g| g.id != everyone)
            .collect();
        groups.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));

        info!(groups = groups.len(), "deleting all groups");
        let mut report = DeleteReport::new(self.failure_limit);

        for group in &groups {
            if group.managed {
                report.skipped += 1;
                continue;
            }
            match self.remote.delete_group(&group.id, DELETE_GROUPS_REASON).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(group = %group.id, error = %e, "group delete failed");
                    report.fail(format!("{} ({})", group.name, group.id), e.message);
                }
            }
        }

        info!(
            deleted = report.deleted,
            failed = report.failed,
            skipped = report.skipped,
            "group deletion finished"
        );
        self.resync("delete_groups").await;
        Ok(report)
    }

    async fn resync(&self, reason: &str) {
        match self.maintainer.full_sync(reason).await {
            Ok(SyncOutcome::Completed(_)) => {}
            Ok(SyncOutcome::AlreadyRunning) => {
                info!(reason, "post-delete sync skipped, a sweep is already running");
            }
            Err(e) => warn!(reason, error = %failure_message(&e), "post-delete sync failed"),
        }
    }
}

//! The engine facade: the one surface the application layer talks to.

use crate::assign::{AssignAction, AssignReport, RoleAssigner};
use crate::config::EngineConfig;
use crate::deleter::{DeleteReport, MassDeleter};
use crate::error::{EngineError, EngineResult};
use crate::export::{ExportArtifacts, MemberExporter};
use crate::import::{ImportPayload, ImportReport, Importer};
use crate::maintainer::{MirrorMaintainer, MirrorNotice, Subscription, SyncOutcome};
use crate::orchestrator::{ChannelSyncReport, HierarchySync, SyncMode, SyncReport};
use crate::remote::{ContainerPatch, GroupPatch, PushEventSource, RemotePlatform};
use aclmirror_store::MirrorStore;
use aclmirror_types::{Container, ContainerId, GroupId, PrincipalGroup, PrincipalId, PushAction};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const EDIT_GROUP_REASON: &str = "Role edit (panel)";
const EDIT_CONTAINER_REASON: &str = "Channel edit (panel)";
const MIN_BITRATE: u32 = 8000;

/// Permission sync, mirroring and bulk mutation for one workspace.
pub struct MirrorEngine {
    config: EngineConfig,
    remote: Arc<dyn RemotePlatform>,
    maintainer: Arc<MirrorMaintainer>,
    hierarchy: HierarchySync,
    importer: Importer,
    assigner: RoleAssigner,
    deleter: MassDeleter,
    exporter: MemberExporter,
}

impl MirrorEngine {
    /// Builds an engine over an already-open store.
    pub fn new(
        config: EngineConfig,
        remote: Arc<dyn RemotePlatform>,
        store: MirrorStore,
    ) -> EngineResult<Self> {
        if config.workspace_id != remote.workspace_id() {
            return Err(EngineError::Config(format!(
                "configured workspace {} does not match remote workspace {}",
                config.workspace_id,
                remote.workspace_id()
            )));
        }

        let maintainer = Arc::new(MirrorMaintainer::new(Arc::clone(&remote), store));
        Ok(Self {
            hierarchy: HierarchySync::new(
                Arc::clone(&remote),
                config.pace_delay,
                config.sync_failure_limit,
            ),
            importer: Importer::new(Arc::clone(&remote), config.clone()),
            assigner: RoleAssigner::new(Arc::clone(&remote), config.report_failure_limit),
            deleter: MassDeleter::new(
                Arc::clone(&remote),
                Arc::clone(&maintainer),
                config.delete_failure_limit,
            ),
            exporter: MemberExporter::new(Arc::clone(&remote)),
            maintainer,
            remote,
            config,
        })
    }

    /// Builds an engine with its cache at `config.cache_path`.
    pub fn open(config: EngineConfig, remote: Arc<dyn RemotePlatform>) -> EngineResult<Self> {
        let store = MirrorStore::new(&config.cache_path)?;
        Self::new(config, remote, store)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn maintainer(&self) -> &Arc<MirrorMaintainer> {
        &self.maintainer
    }

    // ── Background upkeep ────────────────────────────────────────

    /// Starts draining push events into the cache.
    pub fn subscribe(&self, source: &dyn PushEventSource) -> Subscription {
        self.maintainer.subscribe(source)
    }

    /// Starts the startup sweep and the periodic reconcile.
    pub fn spawn_sync_loop(&self) -> JoinHandle<()> {
        self.maintainer.spawn_interval(self.config.sync_interval)
    }

    pub fn notices(&self) -> broadcast::Receiver<MirrorNotice> {
        self.maintainer.notices()
    }

    pub async fn full_sync(&self, reason: &str) -> EngineResult<SyncOutcome> {
        self.maintainer.full_sync(reason).await
    }

    // ── Override sync ────────────────────────────────────────────

    pub async fn sync_category(
        &self,
        category_id: &ContainerId,
        mode: SyncMode,
        dry_run: bool,
    ) -> EngineResult<SyncReport> {
        self.hierarchy.sync_category(category_id, mode, dry_run).await
    }

    pub async fn sync_channel(
        &self,
        container_id: &ContainerId,
        mode: SyncMode,
        dry_run: bool,
    ) -> EngineResult<ChannelSyncReport> {
        self.hierarchy.sync_channel(container_id, mode, dry_run).await
    }

    // ── Bulk operations ──────────────────────────────────────────

    /// Runs an import, then reconciles the cache.
    pub async fn apply_import(&self, payload: &ImportPayload) -> EngineResult<ImportReport> {
        let report = self.importer.apply_import(payload).await?;
        self.resync("import_apply").await;
        Ok(report)
    }

    pub async fn assign_role(
        &self,
        action: AssignAction,
        group_id: &GroupId,
        principal_ids: &[PrincipalId],
    ) -> EngineResult<AssignReport> {
        let report = self.assigner.assign(action, group_id, principal_ids).await?;
        // Memberships are not mirrored; observers still get a refresh signal.
        self.maintainer.notify(MirrorNotice::Group {
            action: PushAction::Update,
            id: report.group.clone(),
        });
        Ok(report)
    }

    pub async fn delete_all_containers(&self) -> EngineResult<DeleteReport> {
        self.deleter.delete_all_containers().await
    }

    pub async fn delete_all_groups(&self) -> EngineResult<DeleteReport> {
        self.deleter.delete_all_groups().await
    }

    pub async fn export_members(&self, include_bots: bool) -> EngineResult<ExportArtifacts> {
        self.exporter.export(include_bots, &self.config.export_dir).await
    }

    async fn resync(&self, reason: &str) {
        match self.maintainer.full_sync(reason).await {
            Ok(SyncOutcome::Completed(_)) => {}
            Ok(SyncOutcome::AlreadyRunning) => info!(reason, "follow-up sync skipped, a sweep is running"),
            Err(e) => warn!(reason, error = %e, "follow-up sync failed"),
        }
    }

    // ── Single-entity edits ──────────────────────────────────────

    /// Edits one group. An empty name keeps the current name.
    pub async fn edit_group(&self, id: &GroupId, mut patch: GroupPatch) -> EngineResult<PrincipalGroup> {
        self.remote
            .fetch_group(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("group {id}")))?;
        patch.name = patch.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        self.remote.edit_group(id, patch, EDIT_GROUP_REASON).await?;
        let fresh = self
            .remote
            .fetch_group(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("group {id}")))?;
        self.maintainer.store().upsert_group(&fresh)?;
        self.maintainer.notify(MirrorNotice::Group {
            action: PushAction::Update,
            id: fresh.id.clone(),
        });
        info!(group = %id, "group edited");
        Ok(fresh)
    }

    /// Edits one container. Categories never take a parent; bitrate has a
    /// floor of 8000.
    pub async fn edit_container(
        &self,
        id: &ContainerId,
        mut patch: ContainerPatch,
    ) -> EngineResult<Container> {
        let current = self
            .remote
            .fetch_container(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("container {id}")))?;
        if current.kind.is_thread() {
            return Err(EngineError::NotSyncable(current.label()));
        }
        patch.name = patch.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        if current.kind.is_category() {
            patch.parent_id = None;
        }
        patch.bitrate = patch.bitrate.map(|b| b.max(MIN_BITRATE));

        self.remote.edit_container(id, patch, EDIT_CONTAINER_REASON).await?;
        let fresh = self
            .remote
            .fetch_container(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("container {id}")))?;
        self.maintainer.store().upsert_container(&fresh)?;
        self.maintainer.notify(MirrorNotice::Container {
            action: PushAction::Update,
            id: fresh.id.clone(),
        });
        info!(container = %id, "container edited");
        Ok(fresh)
    }

    // ── Cache queries ────────────────────────────────────────────

    pub fn list_groups(&self) -> EngineResult<Vec<PrincipalGroup>> {
        Ok(self.maintainer.store().list_groups()?)
    }

    pub fn list_containers(&self) -> EngineResult<Vec<Container>> {
        Ok(self.maintainer.store().list_containers()?)
    }
}

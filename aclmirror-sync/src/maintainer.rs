//! Keeps the local mirror in step with the remote.
//!
//! Two paths write the cache: full reconciliation (a fetch of the whole
//! workspace that replaces both tables) and incremental push events (one
//! keyed upsert or delete each). Both are last-write-wins by id, so an event
//! landing in the middle of a sweep is safe.

use crate::error::EngineResult;
use crate::remote::{PushEventSource, RemotePlatform};
use aclmirror_store::MirrorStore;
use aclmirror_types::{Container, ContainerId, GroupId, PushAction, PushEntity, PushEvent};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const NOTICE_CAPACITY: usize = 256;

/// Whether a full reconcile is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
}

/// Row counts written by one full reconcile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub groups: usize,
    pub containers: usize,
    pub groups_pruned: usize,
    pub containers_pruned: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncStats),
    /// Another sweep held the token; this request was dropped.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Applied,
    Ignored,
}

/// Cache-change signal for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MirrorNotice {
    Synced {
        reason: String,
        groups: usize,
        containers: usize,
    },
    SyncFailed {
        reason: String,
        message: String,
    },
    Group {
        action: PushAction,
        id: GroupId,
    },
    Container {
        action: PushAction,
        id: ContainerId,
    },
}

/// Resets the phase to `Idle` when dropped.
struct SyncGuard<'a> {
    phase: &'a Mutex<SyncPhase>,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = SyncPhase::Idle;
    }
}

/// Owns the sync token and the notice channel.
pub struct MirrorMaintainer {
    remote: Arc<dyn RemotePlatform>,
    store: MirrorStore,
    phase: Mutex<SyncPhase>,
    notices: broadcast::Sender<MirrorNotice>,
}

impl MirrorMaintainer {
    pub fn new(remote: Arc<dyn RemotePlatform>, store: MirrorStore) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            remote,
            store,
            phase: Mutex::new(SyncPhase::Idle),
            notices,
        }
    }

    pub fn store(&self) -> &MirrorStore {
        &self.store
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn notices(&self) -> broadcast::Receiver<MirrorNotice> {
        self.notices.subscribe()
    }

    /// Broadcasts to current observers. Having none is fine.
    pub fn notify(&self, notice: MirrorNotice) {
        let _ = self.notices.send(notice);
    }

    fn try_begin(&self) -> Option<SyncGuard<'_>> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase == SyncPhase::Syncing {
            return None;
        }
        *phase = SyncPhase::Syncing;
        Some(SyncGuard { phase: &self.phase })
    }

    // ── Full reconciliation ──────────────────────────────────────

    /// Replaces the cache with a fresh snapshot of the workspace.
    ///
    /// Returns `AlreadyRunning` without doing anything if a sweep is in
    /// flight. On failure the cache keeps its last good state.
    pub async fn full_sync(&self, reason: &str) -> EngineResult<SyncOutcome> {
        let Some(_guard) = self.try_begin() else {
            info!(reason, "full sync already running, request dropped");
            return Ok(SyncOutcome::AlreadyRunning);
        };

        debug!(reason, "full sync started");
        match self.reconcile().await {
            Ok(stats) => {
                info!(
                    reason,
                    groups = stats.groups,
                    containers = stats.containers,
                    groups_pruned = stats.groups_pruned,
                    containers_pruned = stats.containers_pruned,
                    "full sync finished"
                );
                self.notify(MirrorNotice::Synced {
                    reason: reason.to_string(),
                    groups: stats.groups,
                    containers: stats.containers,
                });
                Ok(SyncOutcome::Completed(stats))
            }
            Err(e) => {
                warn!(reason, error = %e, "full sync failed");
                self.notify(MirrorNotice::SyncFailed {
                    reason: reason.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn reconcile(&self) -> EngineResult<SyncStats> {
        let snapshot = self.remote.fetch_hierarchy().await?;
        let containers: Vec<Container> = snapshot
            .containers
            .into_iter()
            .filter(|c| !c.kind.is_thread())
            .collect();

        let groups = self.store.replace_groups(&snapshot.groups)?;
        let containers = self.store.replace_containers(&containers)?;
        Ok(SyncStats {
            groups: groups.upserted,
            containers: containers.upserted,
            groups_pruned: groups.pruned,
            containers_pruned: containers.pruned,
        })
    }

    // ── Push events ──────────────────────────────────────────────

    /// Applies one push event to the cache.
    pub fn handle_event(&self, event: &PushEvent) -> EngineResult<EventDisposition> {
        let workspace = self.remote.workspace_id();
        if event.workspace_id != workspace {
            debug!(workspace = %event.workspace_id, "ignoring event for another workspace");
            return Ok(EventDisposition::Ignored);
        }

        match &event.entity {
            PushEntity::Group(group) => {
                match event.action {
                    PushAction::Create | PushAction::Update => self.store.upsert_group(group)?,
                    PushAction::Delete => {
                        self.store.delete_group(&group.id)?;
                    }
                }
                self.notify(MirrorNotice::Group {
                    action: event.action,
                    id: group.id.clone(),
                });
            }
            PushEntity::Container(container) => {
                if container.kind.is_thread() {
                    debug!(container = %container.id, "ignoring thread event");
                    return Ok(EventDisposition::Ignored);
                }
                match event.action {
                    PushAction::Create | PushAction::Update => self.store.upsert_container(container)?,
                    PushAction::Delete => {
                        self.store.delete_container(&container.id)?;
                    }
                }
                self.notify(MirrorNotice::Container {
                    action: event.action,
                    id: container.id.clone(),
                });
            }
        }
        Ok(EventDisposition::Applied)
    }

    /// Drains `source` into [`handle_event`](Self::handle_event) on a
    /// background task until the returned handle is dropped.
    ///
    /// If the receiver falls behind and events are lost, a full sync is run
    /// in their place.
    pub fn subscribe(self: &Arc<Self>, source: &dyn PushEventSource) -> Subscription {
        let mut events = source.subscribe();
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Err(e) = this.handle_event(&event) {
                            warn!(action = %event.action, error = %e, "push event not applied");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "push events dropped, resyncing");
                        if let Err(e) = this.full_sync("lagged").await {
                            warn!(error = %e, "resync after lag failed");
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("push event source closed");
                        break;
                    }
                }
            }
        });
        Subscription {
            handle: Some(handle),
        }
    }

    /// Runs a startup sweep, then one sweep per `period`.
    pub fn spawn_interval(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut reason = "startup";
            loop {
                ticker.tick().await;
                if let Err(e) = this.full_sync(reason).await {
                    warn!(reason, error = %e, "scheduled sync failed");
                }
                reason = "interval";
            }
        })
    }
}

/// A live push-event subscription. Dropping it stops the drain task.
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

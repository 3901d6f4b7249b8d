//! Remote platform abstraction.
//!
//! Defines the operations the engine consumes from the remote permission
//! platform, plus the push-event source the mirror maintainer subscribes to.
//! The wire protocol lives behind these traits.

use aclmirror_types::{
    AccessOverride, Container, ContainerId, ContainerKind, GroupId, Permissions, Principal,
    PrincipalGroup, PrincipalId, PushEvent, RawOverride, WorkspaceId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Broad classes of remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    PermissionDenied,
    /// The target sits above the acting identity in the hierarchy.
    HierarchyConflict,
    RateLimited,
    NotFound,
    Transport,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RemoteErrorKind::PermissionDenied => "permission denied",
            RemoteErrorKind::HierarchyConflict => "hierarchy conflict",
            RemoteErrorKind::RateLimited => "rate limited",
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::Transport => "transport",
        })
    }
}

/// A failed remote call. `message` is the remote-supplied text and is what
/// ends up in report failure lists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::PermissionDenied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::NotFound, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Transport, message)
    }
}

/// One consistent snapshot of the workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub groups: Vec<PrincipalGroup>,
    pub containers: Vec<Container>,
}

// ── Write shapes ─────────────────────────────────────────────────

/// Attributes of a container to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContainer {
    pub kind: ContainerKind,
    pub name: String,
    pub parent_id: Option<ContainerId>,
    pub topic: Option<String>,
    pub nsfw: Option<bool>,
    pub rate_limit_per_user: Option<u32>,
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
    pub overrides: Vec<RawOverride>,
}

impl NewContainer {
    pub fn new(kind: ContainerKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parent_id: None,
            topic: None,
            nsfw: None,
            rate_limit_per_user: None,
            bitrate: None,
            user_limit: None,
            overrides: Vec::new(),
        }
    }
}

/// A partial container edit. `None` leaves the attribute unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPatch {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub nsfw: Option<bool>,
    pub parent_id: Option<ContainerId>,
    pub rate_limit_per_user: Option<u32>,
    pub bitrate: Option<u32>,
    pub user_limit: Option<u32>,
}

/// Attributes of a group to create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub color: Option<u32>,
    pub hoist: bool,
    pub mentionable: bool,
    pub permissions: Permissions,
}

/// A partial group edit. `None` leaves the attribute unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub color: Option<u32>,
    pub hoist: Option<bool>,
    pub mentionable: Option<bool>,
    pub permissions: Option<Permissions>,
}

// ── Traits ───────────────────────────────────────────────────────

/// The remote permission platform, scoped to one workspace.
///
/// Fetches return `Ok(None)` for an entity that does not exist; writes
/// against a missing entity fail with [`RemoteErrorKind::NotFound`].
#[async_trait]
pub trait RemotePlatform: Send + Sync {
    /// The workspace this client is scoped to. Also the everyone group's id.
    fn workspace_id(&self) -> WorkspaceId;

    async fn fetch_hierarchy(&self) -> RemoteResult<Hierarchy>;

    async fn fetch_container(&self, id: &ContainerId) -> RemoteResult<Option<Container>>;

    async fn fetch_group(&self, id: &GroupId) -> RemoteResult<Option<PrincipalGroup>>;

    async fn fetch_principal(&self, id: &PrincipalId) -> RemoteResult<Option<Principal>>;

    async fn list_principals(&self) -> RemoteResult<Vec<Principal>>;

    async fn create_container(&self, spec: NewContainer, reason: &str) -> RemoteResult<Container>;

    async fn edit_container(
        &self,
        id: &ContainerId,
        patch: ContainerPatch,
        reason: &str,
    ) -> RemoteResult<Container>;

    async fn delete_container(&self, id: &ContainerId, reason: &str) -> RemoteResult<()>;

    /// Replaces the container's whole override list.
    async fn set_overrides(&self, id: &ContainerId, overrides: &[AccessOverride]) -> RemoteResult<()>;

    async fn create_group(&self, spec: NewGroup, reason: &str) -> RemoteResult<PrincipalGroup>;

    async fn edit_group(&self, id: &GroupId, patch: GroupPatch, reason: &str) -> RemoteResult<PrincipalGroup>;

    async fn delete_group(&self, id: &GroupId, reason: &str) -> RemoteResult<()>;

    async fn add_principal_to_group(
        &self,
        group: &GroupId,
        principal: &PrincipalId,
        reason: &str,
    ) -> RemoteResult<()>;

    async fn remove_principal_from_group(
        &self,
        group: &GroupId,
        principal: &PrincipalId,
        reason: &str,
    ) -> RemoteResult<()>;
}

/// A stream of push events from the remote.
pub trait PushEventSource: Send + Sync {
    /// Opens a new receiver. Events sent before this call are not replayed.
    fn subscribe(&self) -> broadcast::Receiver<PushEvent>;
}

/// In-memory remote platform for tests.
pub mod mock {
    use super::*;
    use chrono::Utc;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use std::time::Duration;

    const FIRST_CREATED_ID: u64 = 800_000_000_000_000_000;

    #[derive(Default)]
    struct MockState {
        groups: BTreeMap<GroupId, PrincipalGroup>,
        containers: BTreeMap<ContainerId, Container>,
        principals: BTreeMap<PrincipalId, Principal>,
        calls: Vec<String>,
        failures: HashMap<String, RemoteError>,
        next_id: u64,
        fetch_delay: Option<Duration>,
    }

    /// A remote platform held entirely in memory.
    ///
    /// Every call is appended to a call log as `"op:id"`. Failures are
    /// injected per `(op, id)` pair, or for every id of an op with `"*"`.
    pub struct MockPlatform {
        workspace_id: WorkspaceId,
        state: Mutex<MockState>,
        events: broadcast::Sender<PushEvent>,
    }

    impl MockPlatform {
        /// Creates a platform holding only the workspace's everyone group.
        pub fn new(workspace_id: impl Into<WorkspaceId>) -> Self {
            let workspace_id = workspace_id.into();
            let (events, _) = broadcast::channel(64);
            let mut state = MockState::default();
            let everyone = PrincipalGroup::new(workspace_id.everyone_group(), "@everyone", 0);
            state.groups.insert(everyone.id.clone(), everyone);
            Self {
                workspace_id,
                state: Mutex::new(state),
                events,
            }
        }

        fn state(&self) -> MutexGuard<'_, MockState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }

        pub fn insert_group(&self, group: PrincipalGroup) {
            self.state().groups.insert(group.id.clone(), group);
        }

        pub fn insert_container(&self, container: Container) {
            self.state().containers.insert(container.id.clone(), container);
        }

        pub fn insert_principal(&self, principal: Principal) {
            self.state().principals.insert(principal.id.clone(), principal);
        }

        pub fn remove_container(&self, id: &ContainerId) -> Option<Container> {
            self.state().containers.remove(id)
        }

        /// Makes every future `op` call on `id` fail with `error`.
        pub fn fail(&self, op: &str, id: &str, error: RemoteError) {
            self.state().failures.insert(format!("{op}:{id}"), error);
        }

        /// Delays every hierarchy fetch by `delay`.
        pub fn set_fetch_delay(&self, delay: Duration) {
            self.state().fetch_delay = Some(delay);
        }

        pub fn calls(&self) -> Vec<String> {
            self.state().calls.clone()
        }

        /// Logged calls of a single op, in order.
        pub fn calls_to(&self, op: &str) -> Vec<String> {
            let prefix = format!("{op}:");
            self.state()
                .calls
                .iter()
                .filter(|c| c.starts_with(&prefix))
                .cloned()
                .collect()
        }

        pub fn container(&self, id: &str) -> Option<Container> {
            self.state().containers.get(&ContainerId::new(id)).cloned()
        }

        pub fn containers(&self) -> Vec<Container> {
            self.state().containers.values().cloned().collect()
        }

        pub fn group(&self, id: &str) -> Option<PrincipalGroup> {
            self.state().groups.get(&GroupId::new(id)).cloned()
        }

        pub fn groups(&self) -> Vec<PrincipalGroup> {
            self.state().groups.values().cloned().collect()
        }

        pub fn principal(&self, id: &str) -> Option<Principal> {
            self.state().principals.get(&PrincipalId::new(id)).cloned()
        }

        /// Publishes a push event. Returns the number of live receivers.
        pub fn emit(&self, event: PushEvent) -> usize {
            self.events.send(event).unwrap_or(0)
        }

        fn record(&self, op: &str, id: &str) -> RemoteResult<()> {
            let mut state = self.state();
            state.calls.push(format!("{op}:{id}"));
            let hit = state
                .failures
                .get(&format!("{op}:{id}"))
                .or_else(|| state.failures.get(&format!("{op}:*")))
                .cloned();
            match hit {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn allocate_id(state: &mut MockState) -> String {
            state.next_id += 1;
            (FIRST_CREATED_ID + state.next_id).to_string()
        }
    }

    #[async_trait]
    impl RemotePlatform for MockPlatform {
        fn workspace_id(&self) -> WorkspaceId {
            self.workspace_id.clone()
        }

        async fn fetch_hierarchy(&self) -> RemoteResult<Hierarchy> {
            self.record("fetch_hierarchy", self.workspace_id.as_str())?;
            let delay = self.state().fetch_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let state = self.state();
            Ok(Hierarchy {
                groups: state.groups.values().cloned().collect(),
                containers: state.containers.values().cloned().collect(),
            })
        }

        async fn fetch_container(&self, id: &ContainerId) -> RemoteResult<Option<Container>> {
            self.record("fetch_container", id.as_str())?;
            Ok(self.state().containers.get(id).cloned())
        }

        async fn fetch_group(&self, id: &GroupId) -> RemoteResult<Option<PrincipalGroup>> {
            self.record("fetch_group", id.as_str())?;
            Ok(self.state().groups.get(id).cloned())
        }

        async fn fetch_principal(&self, id: &PrincipalId) -> RemoteResult<Option<Principal>> {
            self.record("fetch_principal", id.as_str())?;
            Ok(self.state().principals.get(id).cloned())
        }

        async fn list_principals(&self) -> RemoteResult<Vec<Principal>> {
            self.record("list_principals", self.workspace_id.as_str())?;
            Ok(self.state().principals.values().cloned().collect())
        }

        async fn create_container(&self, spec: NewContainer, _reason: &str) -> RemoteResult<Container> {
            self.record("create_container", &spec.name)?;
            let mut state = self.state();
            let id = Self::allocate_id(&mut state);
            let position = state
                .containers
                .values()
                .filter(|c| c.parent_id == spec.parent_id)
                .count();
            let mut container = Container::new(id, spec.kind, spec.name)
                .with_position(i64::try_from(position).unwrap_or(i64::MAX))
                .with_overrides(spec.overrides);
            container.parent_id = spec.parent_id;
            container.topic = spec.topic;
            container.nsfw = spec.nsfw.unwrap_or(false);
            container.rate_limit_per_user = spec.rate_limit_per_user.unwrap_or(0);
            container.bitrate = spec.bitrate.unwrap_or(0);
            container.user_limit = spec.user_limit.unwrap_or(0);
            state.containers.insert(container.id.clone(), container.clone());
            Ok(container)
        }

        async fn edit_container(
            &self,
            id: &ContainerId,
            patch: ContainerPatch,
            _reason: &str,
        ) -> RemoteResult<Container> {
            self.record("edit_container", id.as_str())?;
            let mut state = self.state();
            let container = state
                .containers
                .get_mut(id)
                .ok_or_else(|| RemoteError::not_found("Unknown Channel"))?;
            if let Some(name) = patch.name {
                container.name = name;
            }
            if let Some(topic) = patch.topic {
                container.topic = Some(topic);
            }
            if let Some(nsfw) = patch.nsfw {
                container.nsfw = nsfw;
            }
            if let Some(parent) = patch.parent_id {
                container.parent_id = Some(parent);
            }
            if let Some(rate) = patch.rate_limit_per_user {
                container.rate_limit_per_user = rate;
            }
            if let Some(bitrate) = patch.bitrate {
                container.bitrate = bitrate;
            }
            if let Some(limit) = patch.user_limit {
                container.user_limit = limit;
            }
            container.updated_at = Utc::now();
            Ok(container.clone())
        }

        async fn delete_container(&self, id: &ContainerId, _reason: &str) -> RemoteResult<()> {
            self.record("delete_container", id.as_str())?;
            self.state()
                .containers
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| RemoteError::not_found("Unknown Channel"))
        }

        async fn set_overrides(&self, id: &ContainerId, overrides: &[AccessOverride]) -> RemoteResult<()> {
            self.record("set_overrides", id.as_str())?;
            let mut state = self.state();
            let container = state
                .containers
                .get_mut(id)
                .ok_or_else(|| RemoteError::not_found("Unknown Channel"))?;
            container.overrides = overrides.iter().map(RawOverride::from).collect();
            Ok(())
        }

        async fn create_group(&self, spec: NewGroup, _reason: &str) -> RemoteResult<PrincipalGroup> {
            self.record("create_group", &spec.name)?;
            let mut state = self.state();
            let id = Self::allocate_id(&mut state);
            let position = i64::try_from(state.groups.len()).unwrap_or(i64::MAX);
            let mut group = PrincipalGroup::new(id, spec.name, position).with_permissions(spec.permissions);
            group.color = spec.color.unwrap_or(0);
            group.hoist = spec.hoist;
            group.mentionable = spec.mentionable;
            state.groups.insert(group.id.clone(), group.clone());
            Ok(group)
        }

        async fn edit_group(&self, id: &GroupId, patch: GroupPatch, _reason: &str) -> RemoteResult<PrincipalGroup> {
            self.record("edit_group", id.as_str())?;
            let mut state = self.state();
            let group = state
                .groups
                .get_mut(id)
                .ok_or_else(|| RemoteError::not_found("Unknown Role"))?;
            if let Some(name) = patch.name {
                group.name = name;
            }
            if let Some(color) = patch.color {
                group.color = color;
            }
            if let Some(hoist) = patch.hoist {
                group.hoist = hoist;
            }
            if let Some(mentionable) = patch.mentionable {
                group.mentionable = mentionable;
            }
            if let Some(permissions) = patch.permissions {
                group.permissions = permissions;
            }
            group.updated_at = Utc::now();
            Ok(group.clone())
        }

        async fn delete_group(&self, id: &GroupId, _reason: &str) -> RemoteResult<()> {
            self.record("delete_group", id.as_str())?;
            self.state()
                .groups
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| RemoteError::not_found("Unknown Role"))
        }

        async fn add_principal_to_group(
            &self,
            group: &GroupId,
            principal: &PrincipalId,
            _reason: &str,
        ) -> RemoteResult<()> {
            self.record("add_principal_to_group", principal.as_str())?;
            let mut state = self.state();
            if !state.groups.contains_key(group) {
                return Err(RemoteError::not_found("Unknown Role"));
            }
            let member = state
                .principals
                .get_mut(principal)
                .ok_or_else(|| RemoteError::not_found("Unknown Member"))?;
            if !member.group_ids.contains(group) {
                member.group_ids.push(group.clone());
            }
            Ok(())
        }

        async fn remove_principal_from_group(
            &self,
            group: &GroupId,
            principal: &PrincipalId,
            _reason: &str,
        ) -> RemoteResult<()> {
            self.record("remove_principal_from_group", principal.as_str())?;
            let mut state = self.state();
            let member = state
                .principals
                .get_mut(principal)
                .ok_or_else(|| RemoteError::not_found("Unknown Member"))?;
            member.group_ids.retain(|g| g != group);
            Ok(())
        }
    }

    impl PushEventSource for MockPlatform {
        fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
            self.events.subscribe()
        }
    }
}

//! Push events emitted by the remote platform.
//!
//! The remote notifies us when a group or container is created, updated or
//! deleted. Each event carries the full entity as the remote last saw it, so
//! applying one is a single keyed upsert or delete.

use crate::{Container, PrincipalGroup, WorkspaceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for PushAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PushAction::Create => "create",
            PushAction::Update => "update",
            PushAction::Delete => "delete",
        })
    }
}

/// The entity an event is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "entity", rename_all = "lowercase")]
pub enum PushEntity {
    Group(PrincipalGroup),
    Container(Container),
}

/// A single notification from the remote's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub workspace_id: WorkspaceId,
    pub action: PushAction,
    #[serde(flatten)]
    pub entity: PushEntity,
}

impl PushEvent {
    pub fn group(workspace_id: WorkspaceId, action: PushAction, group: PrincipalGroup) -> Self {
        Self {
            workspace_id,
            action,
            entity: PushEntity::Group(group),
        }
    }

    pub fn container(workspace_id: WorkspaceId, action: PushAction, container: Container) -> Self {
        Self {
            workspace_id,
            action,
            entity: PushEntity::Container(container),
        }
    }
}

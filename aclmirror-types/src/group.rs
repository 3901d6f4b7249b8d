//! Principal groups and principals.

use crate::{GroupId, Permissions, PrincipalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, rankable set of permissions grantable to principals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    /// Displayed separately from other groups.
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub mentionable: bool,
    /// Rank. Higher means more privilege.
    pub position: i64,
    pub permissions: Permissions,
    /// Owned by an integration; this engine never mutates it.
    #[serde(default)]
    pub managed: bool,
    pub updated_at: DateTime<Utc>,
}

impl PrincipalGroup {
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>, position: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: 0,
            hoist: false,
            mentionable: false,
            position,
            permissions: Permissions::EMPTY,
            managed: false,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn managed(mut self) -> Self {
        self.managed = true;
        self
    }
}

/// A member of the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub group_ids: Vec<GroupId>,
}

impl Principal {
    pub fn new(id: impl Into<PrincipalId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            global_name: None,
            bot: false,
            group_ids: Vec::new(),
        }
    }

    #[must_use]
    pub fn bot(mut self) -> Self {
        self.bot = true;
        self
    }
}

//! Adding or removing one group for a list of principals.

use crate::error::{EngineError, EngineResult};
use crate::orchestrator::failure_message;
use crate::remote::RemotePlatform;
use crate::report::{Failure, FailureList};
use aclmirror_types::{is_snowflake, GroupId, PrincipalId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

const ASSIGN_REASON: &str = "Role assignment (panel)";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignAction {
    #[default]
    Add,
    Remove,
}

impl fmt::Display for AssignAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssignAction::Add => "add",
            AssignAction::Remove => "remove",
        })
    }
}

impl FromStr for AssignAction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(AssignAction::Add),
            "remove" => Ok(AssignAction::Remove),
            other => Err(EngineError::Validation(format!("unknown assign action: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignReport {
    pub action: AssignAction,
    pub group: GroupId,
    pub group_name: String,
    pub total: usize,
    pub succeeded: Vec<PrincipalId>,
    pub failures: FailureList,
}

/// Extracts principal ids from free text.
///
/// Splits on whitespace and commas, keeps tokens with the id shape and drops
/// repeats, preserving first-seen order.
pub fn parse_principal_ids(text: &str) -> Vec<PrincipalId> {
    let mut seen = HashSet::new();
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| is_snowflake(token))
        .filter(|token| seen.insert(*token))
        .map(PrincipalId::new)
        .collect()
}

pub struct RoleAssigner {
    remote: Arc<dyn RemotePlatform>,
    failure_limit: usize,
}

impl RoleAssigner {
    pub fn new(remote: Arc<dyn RemotePlatform>, failure_limit: usize) -> Self {
        Self {
            remote,
            failure_limit,
        }
    }

    /// Applies `action` for each principal in turn. One principal failing
    /// does not stop the others.
    pub async fn assign(
        &self,
        action: AssignAction,
        group_id: &GroupId,
        principal_ids: &[PrincipalId],
    ) -> EngineResult<AssignReport> {
        if !group_id.is_snowflake() {
            return Err(EngineError::InvalidIdentifier(format!("group {group_id}")));
        }
        if principal_ids.is_empty() {
            return Err(EngineError::Validation("no principal ids given".to_string()));
        }
        let group = self
            .remote
            .fetch_group(group_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("group {group_id}")))?;

        let mut report = AssignReport {
            action,
            group: group.id.clone(),
            group_name: group.name.clone(),
            total: principal_ids.len(),
            succeeded: Vec::new(),
            failures: FailureList::new(self.failure_limit),
        };

        for principal in principal_ids {
            match self.assign_one(action, group_id, principal).await {
                Ok(()) => report.succeeded.push(principal.clone()),
                Err(e) => {
                    warn!(%principal, %action, error = %e, "assignment failed");
                    report.failures.push(Failure::new(principal.as_str(), failure_message(&e)));
                }
            }
        }

        info!(
            group = %group_id,
            %action,
            succeeded = report.succeeded.len(),
            failed = report.failures.total(),
            "assignment finished"
        );
        Ok(report)
    }

    async fn assign_one(
        &self,
        action: AssignAction,
        group_id: &GroupId,
        principal: &PrincipalId,
    ) -> EngineResult<()> {
        self.remote
            .fetch_principal(principal)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("principal {principal}")))?;
        match action {
            AssignAction::Add => {
                self.remote
                    .add_principal_to_group(group_id, principal, ASSIGN_REASON)
                    .await?
            }
            AssignAction::Remove => {
                self.remote
                    .remove_principal_from_group(group_id, principal, ASSIGN_REASON)
                    .await?
            }
        }
        Ok(())
    }
}

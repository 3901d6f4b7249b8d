//! Member list export.

use crate::error::{EngineError, EngineResult};
use crate::remote::RemotePlatform;
use aclmirror_types::{Principal, PrincipalId, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const PREVIEW_LEN: usize = 200;
const CSV_HEADERS: [&str; 4] = ["id", "username", "globalName", "isBot"];

/// Files written by one export, plus a short id preview for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportArtifacts {
    pub count: usize,
    pub ids_path: PathBuf,
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
    pub preview: Vec<PrincipalId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberRow<'a> {
    id: &'a str,
    username: &'a str,
    global_name: &'a str,
    is_bot: bool,
}

impl<'a> From<&'a Principal> for MemberRow<'a> {
    fn from(p: &'a Principal) -> Self {
        Self {
            id: p.id.as_str(),
            username: &p.username,
            global_name: p.global_name.as_deref().unwrap_or(""),
            is_bot: p.bot,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MemberDump<'a> {
    workspace_id: &'a WorkspaceId,
    dumped_at: DateTime<Utc>,
    include_bots: bool,
    count: usize,
    members: Vec<MemberRow<'a>>,
}

pub struct MemberExporter {
    remote: Arc<dyn RemotePlatform>,
}

impl MemberExporter {
    pub fn new(remote: Arc<dyn RemotePlatform>) -> Self {
        Self { remote }
    }

    /// Writes the workspace's members to `dir` as an id list, CSV and JSON.
    pub async fn export(&self, include_bots: bool, dir: &Path) -> EngineResult<ExportArtifacts> {
        let mut members: Vec<Principal> = self
            .remote
            .list_principals()
            .await?
            .into_iter()
            .filter(|p| include_bots || !p.bot)
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));

        let workspace = self.remote.workspace_id();
        let now = Utc::now();
        let base = format!(
            "workspace-{workspace}-{}{}",
            now.format("%Y%m%d-%H%M%S"),
            if include_bots { "-with-bots" } else { "" }
        );
        tokio::fs::create_dir_all(dir).await?;

        let ids_path = dir.join(format!("{base}-ids.txt"));
        let csv_path = dir.join(format!("{base}-members.csv"));
        let json_path = dir.join(format!("{base}-members.json"));

        let mut ids: String = members.iter().map(|m| format!("{}\n", m.id)).collect();
        if ids.is_empty() {
            ids.push('\n');
        }
        tokio::fs::write(&ids_path, ids).await?;

        let rows: Vec<MemberRow<'_>> = members.iter().map(MemberRow::from).collect();
        tokio::fs::write(&csv_path, members_csv(&rows)?).await?;

        let dump = MemberDump {
            workspace_id: &workspace,
            dumped_at: now,
            include_bots,
            count: rows.len(),
            members: rows,
        };
        tokio::fs::write(&json_path, serde_json::to_vec_pretty(&dump)?).await?;

        info!(count = members.len(), include_bots, path = %json_path.display(), "members exported");
        Ok(ExportArtifacts {
            count: members.len(),
            ids_path,
            csv_path,
            json_path,
            preview: members.iter().take(PREVIEW_LEN).map(|m| m.id.clone()).collect(),
        })
    }
}

/// Renders the member rows as CSV. The header is written even when there are
/// no rows.
fn members_csv(rows: &[MemberRow<'_>]) -> EngineResult<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(CSV_HEADERS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner()
        .map_err(|e| EngineError::Io(e.into_error()))
}

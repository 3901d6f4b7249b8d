//! Engine configuration.
//!
//! `EngineConfig::default()` carries every tuning constant; `from_env` layers
//! the deployment's environment on top of it.

use crate::error::{EngineError, EngineResult};
use aclmirror_types::WorkspaceId;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
const DEFAULT_PACE_MS: u64 = 250;
const DEFAULT_CACHE_PATH: &str = "data/mirror/mirror.db";
const DEFAULT_EXPORT_DIR: &str = "data/mirror/exports";

/// Configuration for the mirror engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The one workspace this engine maintains.
    pub workspace_id: WorkspaceId,
    /// Period of the background full reconcile.
    #[serde(rename = "sync_interval_secs", deserialize_with = "duration_secs")]
    pub sync_interval: Duration,
    /// Gap between consecutive children in a category sync.
    #[serde(rename = "pace_delay_ms", deserialize_with = "duration_ms")]
    pub pace_delay: Duration,
    /// Failure records kept in a category sync report.
    pub sync_failure_limit: usize,
    /// Failure records kept in a mass-delete report.
    pub delete_failure_limit: usize,
    /// Failure records kept in import and assignment reports.
    pub report_failure_limit: usize,
    pub group_concurrency: usize,
    pub container_concurrency: usize,
    pub max_import_groups: usize,
    pub max_import_containers: usize,
    pub cache_path: PathBuf,
    pub export_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_id: WorkspaceId::new(""),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            pace_delay: Duration::from_millis(DEFAULT_PACE_MS),
            sync_failure_limit: 15,
            delete_failure_limit: 25,
            report_failure_limit: 50,
            group_concurrency: 3,
            container_concurrency: 2,
            max_import_groups: 250,
            max_import_containers: 500,
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
        }
    }
}

impl EngineConfig {
    /// Default configuration for one workspace.
    pub fn for_workspace(workspace_id: impl Into<WorkspaceId>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            ..Self::default()
        }
    }

    /// Reads the configuration from process environment variables.
    ///
    /// `ACLMIRROR_WORKSPACE` is required. `ACLMIRROR_SYNC_INTERVAL_SECS`,
    /// `ACLMIRROR_PACE_MS`, `ACLMIRROR_CACHE_PATH` and `ACLMIRROR_EXPORT_DIR`
    /// override the defaults.
    pub fn from_env() -> EngineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workspace = lookup("ACLMIRROR_WORKSPACE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EngineError::Config("ACLMIRROR_WORKSPACE is required".to_string()))?;
        if !aclmirror_types::is_snowflake(&workspace) {
            return Err(EngineError::Config(format!(
                "ACLMIRROR_WORKSPACE is not a workspace id: {workspace}"
            )));
        }

        let mut config = Self::for_workspace(workspace);
        if let Some(secs) = parse_var::<u64, _>(&lookup, "ACLMIRROR_SYNC_INTERVAL_SECS")? {
            if secs == 0 {
                return Err(EngineError::Config(
                    "ACLMIRROR_SYNC_INTERVAL_SECS must be positive".to_string(),
                ));
            }
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "ACLMIRROR_PACE_MS")? {
            config.pace_delay = Duration::from_millis(ms);
        }
        if let Some(path) = lookup("ACLMIRROR_CACHE_PATH").filter(|v| !v.trim().is_empty()) {
            config.cache_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("ACLMIRROR_EXPORT_DIR").filter(|v| !v.trim().is_empty()) {
            config.export_dir = PathBuf::from(dir);
        }
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> EngineResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| EngineError::Config(format!("parse {key}={raw:?}: {e}"))),
    }
}

fn duration_secs<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_secs)
}

fn duration_ms<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
}

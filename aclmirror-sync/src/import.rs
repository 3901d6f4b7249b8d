//! Declarative bulk creation of groups and containers.
//!
//! An import runs in three phases so that later items can reference earlier
//! ones by name: groups, then categories, then every other container. Each
//! phase goes through the bounded pool; a failing item is recorded and the
//! rest of its phase carries on.

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::orchestrator::failure_message;
use crate::pool::{run_bounded, PoolFailure};
use crate::remote::{Hierarchy, NewContainer, NewGroup, RemotePlatform};
use crate::report::FailureList;
use aclmirror_types::{
    is_snowflake, ContainerId, ContainerKind, GroupId, OverrideKind, PermissionSpec, Permissions,
    RawOverride, WorkspaceId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const IMPORT_REASON: &str = "JSON Import";
const MIN_BITRATE: i64 = 8000;
const EVERYONE: &str = "@everyone";

// ── Payload ──────────────────────────────────────────────────────

/// What to create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPayload {
    #[serde(default, alias = "roles")]
    pub groups: Vec<GroupSpec>,
    #[serde(default, alias = "channels")]
    pub containers: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: Option<Lenient<ColorSpec>>,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub mentionable: bool,
    #[serde(default)]
    pub permissions: Option<Lenient<PermissionSpec>>,
}

/// A payload value that may not have the expected shape.
///
/// Shape errors surface when the owning item runs, so one malformed item
/// fails on its own instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Lenient<T> {
    Valid(T),
    Invalid(serde_json::Value),
}

impl<T> Lenient<T> {
    pub fn get(&self, field: &str) -> EngineResult<&T> {
        match self {
            Lenient::Valid(value) => Ok(value),
            Lenient::Invalid(raw) => Err(EngineError::Validation(format!(
                "{field}: unexpected value {raw}"
            ))),
        }
    }
}

/// A numeric attribute: a number or numeric text. Fractions truncate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberSpec {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberSpec {
    pub fn resolve(&self) -> Option<i64> {
        let truncate = |v: f64| v.is_finite().then(|| v.trunc() as i64);
        match self {
            NumberSpec::Int(v) => Some(*v),
            NumberSpec::Float(v) => truncate(*v),
            NumberSpec::Text(text) => {
                let text = text.trim();
                text.parse::<i64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(truncate))
            }
        }
    }
}

/// A group colour: an integer or a `#rrggbb` string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Value(u32),
    Hex(String),
}

impl ColorSpec {
    /// The colour value. Strings that are not six hex digits mean no colour.
    pub fn resolve(&self) -> Option<u32> {
        match self {
            ColorSpec::Value(v) => Some(*v),
            ColorSpec::Hex(s) => {
                let hex = s.trim();
                let hex = hex.strip_prefix('#').unwrap_or(hex);
                if hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    None
                }
            }
        }
    }
}

/// A container kind as written in a payload: a name or a numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KindSpec {
    Code(i64),
    Name(String),
}

impl KindSpec {
    pub fn resolve(&self) -> EngineResult<ContainerKind> {
        match self {
            KindSpec::Code(code) => Ok(ContainerKind::from_code(*code)?),
            KindSpec::Name(name) => Ok(ContainerKind::resolve(name)?),
        }
    }
}

impl fmt::Display for KindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindSpec::Code(code) => write!(f, "{code}"),
            KindSpec::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    #[serde(default, rename = "type")]
    pub kind: Option<Lenient<KindSpec>>,
    #[serde(default)]
    pub name: String,
    /// A category name or id.
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: Option<bool>,
    #[serde(default, alias = "rate_limit")]
    pub rate_limit_per_user: Option<Lenient<NumberSpec>>,
    #[serde(default)]
    pub bitrate: Option<Lenient<NumberSpec>>,
    #[serde(default, alias = "user_limit")]
    pub user_limit: Option<Lenient<NumberSpec>>,
    #[serde(default, alias = "permissionOverwrites")]
    pub overwrites: Vec<OverwriteSpec>,
}

impl ContainerSpec {
    /// The declared kind. A missing or unknown type fails this item only.
    pub fn kind(&self) -> EngineResult<ContainerKind> {
        match &self.kind {
            Some(kind) => kind.get("type")?.resolve(),
            None => Err(EngineError::Validation("container type is required".to_string())),
        }
    }

    /// The type as written, for failure records.
    pub fn kind_label(&self) -> String {
        match &self.kind {
            Some(Lenient::Valid(kind)) => kind.to_string(),
            Some(Lenient::Invalid(raw)) => raw.to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverwriteSpec {
    /// `@everyone`, a group id or a group name.
    #[serde(default, alias = "role", alias = "targetId", alias = "id")]
    pub target: String,
    #[serde(default)]
    pub allow: Option<Lenient<PermissionSpec>>,
    #[serde(default)]
    pub deny: Option<Lenient<PermissionSpec>>,
}

// ── Report ───────────────────────────────────────────────────────

/// An entity the import created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedItem {
    pub id: String,
    pub name: String,
    pub kind: String,
}

/// An item the import could not create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub name: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub groups_created: Vec<CreatedItem>,
    pub groups_failed: FailureList<ItemFailure>,
    pub containers_created: Vec<CreatedItem>,
    pub containers_failed: FailureList<ItemFailure>,
}

impl ImportReport {
    fn new(cap: usize) -> Self {
        Self {
            groups_created: Vec::new(),
            groups_failed: FailureList::new(cap),
            containers_created: Vec::new(),
            containers_failed: FailureList::new(cap),
        }
    }

    #[must_use]
    pub fn created(&self) -> usize {
        self.groups_created.len() + self.containers_created.len()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.groups_failed.total() + self.containers_failed.total()
    }
}

// ── Importer ─────────────────────────────────────────────────────

/// Name lookups available while resolving references.
struct Names<'a> {
    workspace: &'a WorkspaceId,
    snapshot: &'a Hierarchy,
    groups: HashMap<String, GroupId>,
    categories: HashMap<String, ContainerId>,
}

impl Names<'_> {
    fn group(&self, target: &str) -> EngineResult<GroupId> {
        let s = target.trim();
        if s == EVERYONE {
            return Ok(self.workspace.everyone_group());
        }
        if is_snowflake(s) {
            return Ok(GroupId::new(s));
        }
        if let Some(id) = self.groups.get(s) {
            return Ok(id.clone());
        }
        self.snapshot
            .groups
            .iter()
            .find(|g| g.name == s)
            .map(|g| g.id.clone())
            .ok_or_else(|| EngineError::UnresolvedReference(format!("overwrite target {s:?}")))
    }

    fn category(&self, parent: &str) -> EngineResult<ContainerId> {
        let s = parent.trim();
        if is_snowflake(s) {
            return Ok(ContainerId::new(s));
        }
        if let Some(id) = self.categories.get(s) {
            return Ok(id.clone());
        }
        self.snapshot
            .containers
            .iter()
            .find(|c| c.kind.is_category() && c.name == s)
            .map(|c| c.id.clone())
            .ok_or_else(|| EngineError::UnresolvedReference(format!("parent category {s:?}")))
    }
}

pub struct Importer {
    remote: Arc<dyn RemotePlatform>,
    config: EngineConfig,
}

impl Importer {
    pub fn new(remote: Arc<dyn RemotePlatform>, config: EngineConfig) -> Self {
        Self { remote, config }
    }

    /// Creates everything the payload declares.
    ///
    /// Over-limit payloads are rejected before any remote call. Past that,
    /// only a failure to take the initial snapshot aborts the import.
    pub async fn apply_import(&self, payload: &ImportPayload) -> EngineResult<ImportReport> {
        if payload.groups.len() > self.config.max_import_groups {
            return Err(EngineError::ImportLimit {
                what: "groups",
                count: payload.groups.len(),
                limit: self.config.max_import_groups,
            });
        }
        if payload.containers.len() > self.config.max_import_containers {
            return Err(EngineError::ImportLimit {
                what: "containers",
                count: payload.containers.len(),
                limit: self.config.max_import_containers,
            });
        }

        let snapshot = self.remote.fetch_hierarchy().await?;
        let workspace = self.remote.workspace_id();
        let mut names = Names {
            workspace: &workspace,
            snapshot: &snapshot,
            groups: HashMap::new(),
            categories: HashMap::new(),
        };
        let mut report = ImportReport::new(self.config.report_failure_limit);

        info!(
            groups = payload.groups.len(),
            containers = payload.containers.len(),
            "import started"
        );

        // Groups first, so container overwrites can name them.
        let results = run_bounded(self.config.group_concurrency, &payload.groups, |spec| {
            self.create_group(spec)
        })
        .await;
        for (spec, result) in payload.groups.iter().zip(results) {
            match result {
                Ok(item) => {
                    names.groups.insert(item.name.clone(), GroupId::new(item.id.clone()));
                    report.groups_created.push(item);
                }
                Err(e) => report.groups_failed.push(item_failure(&spec.name, "group", e)),
            }
        }

        let mut categories = Vec::new();
        let mut others = Vec::new();
        for spec in &payload.containers {
            match spec.kind() {
                Ok(kind) if kind.is_category() => categories.push((spec, kind)),
                Ok(kind) => others.push((spec, kind)),
                Err(e) => report.containers_failed.push(ItemFailure {
                    name: spec.name.clone(),
                    kind: spec.kind_label(),
                    message: e.to_string(),
                }),
            }
        }

        let results = run_bounded(self.config.container_concurrency, &categories, |(spec, kind)| {
            self.create_container(spec, *kind, &names, false)
        })
        .await;
        let mut created_categories = Vec::new();
        for ((spec, _), result) in categories.iter().zip(results) {
            match result {
                Ok(item) => {
                    created_categories.push((item.name.clone(), ContainerId::new(item.id.clone())));
                    report.containers_created.push(item);
                }
                Err(e) => report
                    .containers_failed
                    .push(item_failure(&spec.name, &spec.kind_label(), e)),
            }
        }
        names.categories.extend(created_categories);

        let results = run_bounded(self.config.container_concurrency, &others, |(spec, kind)| {
            self.create_container(spec, *kind, &names, true)
        })
        .await;
        for ((spec, _), result) in others.iter().zip(results) {
            match result {
                Ok(item) => report.containers_created.push(item),
                Err(e) => report
                    .containers_failed
                    .push(item_failure(&spec.name, &spec.kind_label(), e)),
            }
        }

        info!(created = report.created(), failed = report.failed(), "import finished");
        Ok(report)
    }

    async fn create_group(&self, spec: &GroupSpec) -> EngineResult<CreatedItem> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("group name required".to_string()));
        }
        let permissions = resolve_permissions("permissions", spec.permissions.as_ref())?;
        let color = match &spec.color {
            Some(Lenient::Valid(color)) => color.resolve(),
            _ => None,
        };
        let new = NewGroup {
            name: name.to_string(),
            color,
            hoist: spec.hoist,
            mentionable: spec.mentionable,
            permissions,
        };
        let group = self.remote.create_group(new, IMPORT_REASON).await?;
        Ok(CreatedItem {
            id: group.id.to_string(),
            name: name.to_string(),
            kind: "group".to_string(),
        })
    }

    async fn create_container(
        &self,
        spec: &ContainerSpec,
        kind: ContainerKind,
        names: &Names<'_>,
        with_parent: bool,
    ) -> EngineResult<CreatedItem> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation("container name required".to_string()));
        }

        let mut new = NewContainer::new(kind, name);
        if with_parent {
            new.parent_id = match spec.parent.as_deref().map(str::trim) {
                Some(parent) if !parent.is_empty() => Some(names.category(parent)?),
                _ => None,
            };
        }
        new.topic = spec.topic.clone();
        new.nsfw = spec.nsfw;
        new.rate_limit_per_user =
            number("rateLimitPerUser", spec.rate_limit_per_user.as_ref())?.map(clamp_non_negative);
        new.bitrate = number("bitrate", spec.bitrate.as_ref())?
            .map(|b| clamp_non_negative(b.max(MIN_BITRATE)));
        new.user_limit = number("userLimit", spec.user_limit.as_ref())?.map(clamp_non_negative);
        new.overrides = spec
            .overwrites
            .iter()
            .map(|ow| -> EngineResult<RawOverride> {
                if ow.target.trim().is_empty() {
                    return Err(EngineError::Validation("overwrite target required".to_string()));
                }
                let allow = resolve_permissions("allow", ow.allow.as_ref())?;
                let deny = resolve_permissions("deny", ow.deny.as_ref())?;
                Ok(RawOverride {
                    id: names.group(&ow.target)?.to_string(),
                    kind: OverrideKind::Group,
                    allow: Some(allow.into()),
                    deny: Some(deny.into()),
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let container = self.remote.create_container(new, IMPORT_REASON).await?;
        Ok(CreatedItem {
            id: container.id.to_string(),
            name: name.to_string(),
            kind: kind.canonical_name().to_string(),
        })
    }
}

fn resolve_permissions(field: &str, spec: Option<&Lenient<PermissionSpec>>) -> EngineResult<Permissions> {
    match spec {
        Some(spec) => Ok(spec.get(field)?.resolve()?),
        None => Ok(Permissions::EMPTY),
    }
}

fn number(field: &str, value: Option<&Lenient<NumberSpec>>) -> EngineResult<Option<i64>> {
    let Some(value) = value else {
        return Ok(None);
    };
    value
        .get(field)?
        .resolve()
        .map(Some)
        .ok_or_else(|| EngineError::Validation(format!("{field} is not a number")))
}

fn clamp_non_negative(v: i64) -> u32 {
    u32::try_from(v.max(0)).unwrap_or(u32::MAX)
}

fn item_failure(name: &str, kind: &str, failure: PoolFailure<EngineError>) -> ItemFailure {
    let message = match &failure {
        PoolFailure::Worker(e) => failure_message(e),
        PoolFailure::Panicked(msg) => format!("worker panicked: {msg}"),
    };
    warn!(name, kind, error = %message, "import item failed");
    ItemFailure {
        name: name.to_string(),
        kind: kind.to_string(),
        message,
    }
}

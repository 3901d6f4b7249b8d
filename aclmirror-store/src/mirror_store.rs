//! Persistent mirror of the remote workspace's groups and containers.
//!
//! Uses a single SQLite file. Overrides are kept as the JSON the remote
//! reported so that a cached container can be handed back unchanged.

use crate::error::{StoreError, StoreResult};
use aclmirror_types::{Container, ContainerId, ContainerKind, GroupId, Permissions, PrincipalGroup, RawOverride};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const GROUP_COLUMNS: &str =
    "id, name, color, hoist, mentionable, position, permissions, managed, updated_at";
const CONTAINER_COLUMNS: &str = "id, kind, name, parent_id, position, topic, nsfw, rate_limit, \
     bitrate, user_limit, overrides, updated_at";

/// Counts from a snapshot replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceStats {
    pub upserted: usize,
    pub pruned: usize,
}

/// Persistent mirror cache backed by SQLite.
#[derive(Clone)]
pub struct MirrorStore {
    conn: Arc<Mutex<Connection>>,
}

impl MirrorStore {
    /// Opens (or creates) a mirror store at the given path.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        debug!(path = %path.display(), "opened mirror store");
        Ok(store)
    }

    /// Opens an in-memory mirror store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                color INTEGER NOT NULL DEFAULT 0,
                hoist INTEGER NOT NULL DEFAULT 0,
                mentionable INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL DEFAULT 0,
                permissions TEXT NOT NULL DEFAULT '0',
                managed INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS containers (
                id TEXT PRIMARY KEY,
                kind INTEGER NOT NULL,
                name TEXT NOT NULL,
                parent_id TEXT,
                position INTEGER NOT NULL DEFAULT 0,
                topic TEXT,
                nsfw INTEGER NOT NULL DEFAULT 0,
                rate_limit INTEGER NOT NULL DEFAULT 0,
                bitrate INTEGER NOT NULL DEFAULT 0,
                user_limit INTEGER NOT NULL DEFAULT 0,
                overrides TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_containers_parent ON containers(parent_id);
            ",
        )?;
        Ok(())
    }

    // ── Groups ───────────────────────────────────────────────────

    /// Inserts or replaces a group, stamping `updated_at` with now.
    pub fn upsert_group(&self, group: &PrincipalGroup) -> StoreResult<()> {
        let conn = self.lock()?;
        write_group(&conn, group)
    }

    /// Removes a group. Returns false if it was not cached.
    pub fn delete_group(&self, id: &GroupId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM groups WHERE id = ?1", params![id.as_str()])?;
        Ok(n > 0)
    }

    pub fn get_group(&self, id: &GroupId) -> StoreResult<Option<PrincipalGroup>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?1"),
                params![id.as_str()],
                GroupRow::read,
            )
            .optional()?;
        raw.map(GroupRow::into_group).transpose()
    }

    /// All cached groups, highest position first, ties broken by name.
    pub fn list_groups(&self) -> StoreResult<Vec<PrincipalGroup>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups ORDER BY position DESC, name ASC"
        ))?;
        let rows = stmt
            .query_map([], GroupRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(GroupRow::into_group).collect()
    }

    /// Replaces the cached group set with `groups` in one transaction.
    pub fn replace_groups(&self, groups: &[PrincipalGroup]) -> StoreResult<ReplaceStats> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for group in groups {
            write_group(&tx, group)?;
        }
        let keep: HashSet<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        let pruned = prune(&tx, "groups", &keep)?;
        tx.commit()?;
        Ok(ReplaceStats {
            upserted: groups.len(),
            pruned,
        })
    }

    // ── Containers ───────────────────────────────────────────────

    /// Inserts or replaces a container, stamping `updated_at` with now.
    pub fn upsert_container(&self, container: &Container) -> StoreResult<()> {
        let conn = self.lock()?;
        write_container(&conn, container)
    }

    /// Removes a container. Returns false if it was not cached.
    pub fn delete_container(&self, id: &ContainerId) -> StoreResult<bool> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM containers WHERE id = ?1", params![id.as_str()])?;
        Ok(n > 0)
    }

    pub fn get_container(&self, id: &ContainerId) -> StoreResult<Option<Container>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {CONTAINER_COLUMNS} FROM containers WHERE id = ?1"),
                params![id.as_str()],
                ContainerRow::read,
            )
            .optional()?;
        raw.map(ContainerRow::into_container).transpose()
    }

    /// All cached containers: top-level first, then grouped by parent and
    /// ordered by position and name within a parent.
    pub fn list_containers(&self) -> StoreResult<Vec<Container>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTAINER_COLUMNS} FROM containers \
             ORDER BY parent_id IS NULL DESC, parent_id ASC, position ASC, name ASC"
        ))?;
        let rows = stmt
            .query_map([], ContainerRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ContainerRow::into_container).collect()
    }

    /// Cached direct children of `parent`, by position then id.
    pub fn children_of(&self, parent: &ContainerId) -> StoreResult<Vec<Container>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTAINER_COLUMNS} FROM containers WHERE parent_id = ?1 \
             ORDER BY position ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![parent.as_str()], ContainerRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ContainerRow::into_container).collect()
    }

    /// Replaces the cached container set with `containers` in one transaction.
    pub fn replace_containers(&self, containers: &[Container]) -> StoreResult<ReplaceStats> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for container in containers {
            write_container(&tx, container)?;
        }
        let keep: HashSet<&str> = containers.iter().map(|c| c.id.as_str()).collect();
        let pruned = prune(&tx, "containers", &keep)?;
        tx.commit()?;
        Ok(ReplaceStats {
            upserted: containers.len(),
            pruned,
        })
    }
}

// ── Row mapping ──────────────────────────────────────────────────

fn write_group(conn: &Connection, group: &PrincipalGroup) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO groups (id, name, color, hoist, mentionable, position, permissions, managed, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            color = excluded.color,
            hoist = excluded.hoist,
            mentionable = excluded.mentionable,
            position = excluded.position,
            permissions = excluded.permissions,
            managed = excluded.managed,
            updated_at = excluded.updated_at",
        params![
            group.id.as_str(),
            group.name,
            group.color,
            group.hoist,
            group.mentionable,
            group.position,
            group.permissions.to_string(),
            group.managed,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn write_container(conn: &Connection, container: &Container) -> StoreResult<()> {
    let overrides = serde_json::to_string(&container.overrides)?;
    conn.execute(
        "INSERT INTO containers (id, kind, name, parent_id, position, topic, nsfw, rate_limit, bitrate, user_limit, overrides, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
            kind = excluded.kind,
            name = excluded.name,
            parent_id = excluded.parent_id,
            position = excluded.position,
            topic = excluded.topic,
            nsfw = excluded.nsfw,
            rate_limit = excluded.rate_limit,
            bitrate = excluded.bitrate,
            user_limit = excluded.user_limit,
            overrides = excluded.overrides,
            updated_at = excluded.updated_at",
        params![
            container.id.as_str(),
            container.kind.code(),
            container.name,
            container.parent_id.as_ref().map(ContainerId::as_str),
            container.position,
            container.topic,
            container.nsfw,
            container.rate_limit_per_user,
            container.bitrate,
            container.user_limit,
            overrides,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Deletes every row of `table` whose id is not in `keep`.
fn prune(tx: &Transaction<'_>, table: &str, keep: &HashSet<&str>) -> StoreResult<usize> {
    let existing: Vec<String> = {
        let mut stmt = tx.prepare(&format!("SELECT id FROM {table}"))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids
    };
    let mut pruned = 0;
    let sql = format!("DELETE FROM {table} WHERE id = ?1");
    for id in existing.iter().filter(|id| !keep.contains(id.as_str())) {
        pruned += tx.execute(&sql, params![id])?;
    }
    Ok(pruned)
}

fn parse_timestamp(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp {raw:?}: {e}")))
}

struct GroupRow {
    id: String,
    name: String,
    color: u32,
    hoist: bool,
    mentionable: bool,
    position: i64,
    permissions: String,
    managed: bool,
    updated_at: String,
}

impl GroupRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            hoist: row.get(3)?,
            mentionable: row.get(4)?,
            position: row.get(5)?,
            permissions: row.get(6)?,
            managed: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_group(self) -> StoreResult<PrincipalGroup> {
        let permissions = Permissions::parse_decimal(&self.permissions)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        Ok(PrincipalGroup {
            id: GroupId::new(self.id),
            name: self.name,
            color: self.color,
            hoist: self.hoist,
            mentionable: self.mentionable,
            position: self.position,
            permissions,
            managed: self.managed,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct ContainerRow {
    id: String,
    kind: i64,
    name: String,
    parent_id: Option<String>,
    position: i64,
    topic: Option<String>,
    nsfw: bool,
    rate_limit: u32,
    bitrate: u32,
    user_limit: u32,
    overrides: String,
    updated_at: String,
}

impl ContainerRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            name: row.get(2)?,
            parent_id: row.get(3)?,
            position: row.get(4)?,
            topic: row.get(5)?,
            nsfw: row.get(6)?,
            rate_limit: row.get(7)?,
            bitrate: row.get(8)?,
            user_limit: row.get(9)?,
            overrides: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_container(self) -> StoreResult<Container> {
        let kind = ContainerKind::from_code(self.kind)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let overrides: Vec<RawOverride> = serde_json::from_str(&self.overrides)?;
        Ok(Container {
            id: ContainerId::new(self.id),
            kind,
            name: self.name,
            parent_id: self.parent_id.map(ContainerId::new),
            position: self.position,
            topic: self.topic,
            nsfw: self.nsfw,
            rate_limit_per_user: self.rate_limit,
            bitrate: self.bitrate,
            user_limit: self.user_limit,
            overrides,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

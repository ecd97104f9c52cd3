//! SQLite-backed relational store.
//!
//! Separate reader/writer connections for interior mutability, same as the
//! storage layer this is adapted from; FTS5 stands in for the trigram and
//! tsvector search the spec describes, scoped to one tenant per query.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::domain::{ContentNode, ContentVariant, MemoryPermission, MemoryVersion, Role, TenantCoordinates};
use crate::error::{AttainedPrefix, CoreError, Result};

use super::{RelationalHit, RelationalStore};

fn store_err(operation: &'static str, source: rusqlite::Error) -> CoreError {
    CoreError::RelationalError {
        operation,
        source: Box::new(source),
        attained: AttainedPrefix::default(),
    }
}

fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<ContentNode> {
    let variant_str: String = row.get("variant")?;
    let metadata_json: String = row.get("metadata")?;
    let tags_json: String = row.get("tags")?;
    let created_ts: i64 = row.get("created_at")?;
    let updated_ts: i64 = row.get("updated_at")?;

    Ok(ContentNode {
        id: row.get("id")?,
        variant: ContentVariant::parse_name(&variant_str).unwrap_or(ContentVariant::Memory),
        body: row.get("body")?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        tenant: TenantCoordinates {
            company_id: row.get("company_id")?,
            app_id: row.get("app_id")?,
            user_id: row.get("user_id")?,
            session_id: row.get("session_id")?,
        },
        created_at: Utc.timestamp_millis_opt(created_ts).single().unwrap_or_else(Utc::now),
        updated_at: Utc.timestamp_millis_opt(updated_ts).single().unwrap_or_else(Utc::now),
        embedding_model: row.get("embedding_model")?,
        hierarchy_level: row.get("hierarchy_level")?,
        parent_id: row.get("parent_id")?,
        title: row.get("title")?,
        source: row.get("source")?,
        version: row.get("version")?,
    })
}

/// SQLite relational store; one database file per deployment, every row
/// scoped by `tenant_id` (`company_id:app_id`).
pub struct SqliteRelationalStore {
    writer: Arc<Mutex<Connection>>,
    reader: Arc<Mutex<Connection>>,
}

impl SqliteRelationalStore {
    pub fn open(db_path: PathBuf) -> Result<Self> {
        let writer_conn = Connection::open(&db_path).map_err(|e| store_err("open", e))?;
        Self::configure(&writer_conn)?;
        Self::migrate(&writer_conn)?;

        let reader_conn = Connection::open(&db_path).map_err(|e| store_err("open", e))?;
        Self::configure(&reader_conn)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(writer_conn)),
            reader: Arc::new(Mutex::new(reader_conn)),
        })
    }

    /// An in-process store backed by a single shared connection, for tests
    /// and for the single-node CLI harness where no separate reader is useful.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| store_err("open", e))?;
        Self::configure(&conn)?;
        Self::migrate(&conn)?;

        let shared = Arc::new(Mutex::new(conn));
        Ok(Self { writer: shared.clone(), reader: shared })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| store_err("configure", e))
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS content_nodes (
                id TEXT PRIMARY KEY,
                variant TEXT NOT NULL,
                body TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                tags TEXT NOT NULL DEFAULT '[]',
                company_id TEXT NOT NULL,
                app_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                session_id TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                embedding_model TEXT,
                hierarchy_level INTEGER NOT NULL DEFAULT 0,
                parent_id TEXT,
                title TEXT,
                source TEXT,
                version INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_content_nodes_tenant
                ON content_nodes(company_id, app_id);

            CREATE VIRTUAL TABLE IF NOT EXISTS content_fts USING fts5(
                id UNINDEXED, tenant_id UNINDEXED, title, body
            );

            CREATE TABLE IF NOT EXISTS memory_versions (
                memory_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                changed_by TEXT NOT NULL,
                change_kind TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (memory_id, version)
            );

            CREATE TABLE IF NOT EXISTS memory_permissions (
                memory_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                granted_by TEXT NOT NULL,
                granted_at INTEGER NOT NULL,
                expires_at INTEGER,
                PRIMARY KEY (memory_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS idempotency_keys (
                tenant_id TEXT NOT NULL,
                key TEXT NOT NULL,
                claimed_at INTEGER NOT NULL,
                PRIMARY KEY (tenant_id, key)
            );",
        )
        .map_err(|e| store_err("migrate", e))
    }

    fn ts(dt: DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }
}

/// Escape a user query for safe embedding inside an FTS5 MATCH expression,
/// treating it as a phrase rather than handing FTS5's query syntax to the caller.
fn sanitize_fts5_query(query: &str) -> String {
    format!("\"{}\"", query.replace('"', "\"\""))
}

#[async_trait]
impl RelationalStore for SqliteRelationalStore {
    async fn upsert_node(&self, node: &ContentNode) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let metadata_json = serde_json::to_string(&node.metadata).unwrap_or_else(|_| "{}".into());
        let tags_json = serde_json::to_string(&node.tags).unwrap_or_else(|_| "[]".into());

        conn.execute(
            "INSERT INTO content_nodes
                (id, variant, body, metadata, tags, company_id, app_id, user_id, session_id,
                 created_at, updated_at, embedding_model, hierarchy_level, parent_id, title, source, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(id) DO UPDATE SET
                body = excluded.body,
                metadata = excluded.metadata,
                tags = excluded.tags,
                updated_at = excluded.updated_at,
                embedding_model = excluded.embedding_model,
                hierarchy_level = excluded.hierarchy_level,
                parent_id = excluded.parent_id,
                title = excluded.title,
                source = excluded.source,
                version = excluded.version
             WHERE excluded.updated_at > content_nodes.updated_at",
            params![
                node.id,
                node.variant.as_str(),
                node.body,
                metadata_json,
                tags_json,
                node.tenant.company_id,
                node.tenant.app_id,
                node.tenant.user_id,
                node.tenant.session_id,
                Self::ts(node.created_at),
                Self::ts(node.updated_at),
                node.embedding_model,
                node.hierarchy_level,
                node.parent_id,
                node.title,
                node.source,
                node.version,
            ],
        )
        .map_err(|e| store_err("upsert_node", e))?;

        conn.execute("DELETE FROM content_fts WHERE id = ?1", params![node.id])
            .map_err(|e| store_err("upsert_node_fts_delete", e))?;
        conn.execute(
            "INSERT INTO content_fts (id, tenant_id, title, body) VALUES (?1, ?2, ?3, ?4)",
            params![node.id, node.tenant.tenant_id(), node.title.clone().unwrap_or_default(), node.body],
        )
        .map_err(|e| store_err("upsert_node_fts_insert", e))?;

        Ok(())
    }

    async fn get_node(&self, tenant_id: &str, id: &str) -> Result<Option<ContentNode>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let (company_id, app_id) = split_tenant_id(tenant_id)?;
        conn.query_row(
            "SELECT * FROM content_nodes WHERE id = ?1 AND company_id = ?2 AND app_id = ?3",
            params![id, company_id, app_id],
            row_to_node,
        )
        .optional()
        .map_err(|e| store_err("get_node", e))
    }

    async fn delete_node(&self, tenant_id: &str, id: &str) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let (company_id, app_id) = split_tenant_id(tenant_id)?;
        conn.execute(
            "DELETE FROM content_nodes WHERE id = ?1 AND company_id = ?2 AND app_id = ?3",
            params![id, company_id, app_id],
        )
        .map_err(|e| store_err("delete_node", e))?;
        conn.execute("DELETE FROM content_fts WHERE id = ?1", params![id])
            .map_err(|e| store_err("delete_node_fts", e))?;
        Ok(())
    }

    async fn search_fts(&self, tenant_id: &str, query: &str, limit: usize) -> Result<Vec<RelationalHit>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let escaped = sanitize_fts5_query(query);
        let mut stmt = conn
            .prepare(
                "SELECT content_nodes.*, bm25(content_fts) AS rank
                 FROM content_fts
                 JOIN content_nodes ON content_nodes.id = content_fts.id
                 WHERE content_fts.tenant_id = ?1 AND content_fts MATCH ?2
                 ORDER BY rank LIMIT ?3",
            )
            .map_err(|e| store_err("search_fts", e))?;

        let rows = stmt
            .query_map(params![tenant_id, escaped, limit as i64], |row| {
                let node = row_to_node(row)?;
                let rank: f64 = row.get("rank")?;
                // bm25() returns lower-is-better; invert into an ascending score.
                Ok(RelationalHit { node, fts_score: 1.0 / (1.0 + rank.max(0.0)) })
            })
            .map_err(|e| store_err("search_fts", e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| store_err("search_fts", e))
    }

    async fn search_by_title(&self, tenant_id: &str, query: &str, limit: usize) -> Result<Vec<RelationalHit>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        let (company_id, app_id) = split_tenant_id(tenant_id)?;
        let like_pattern = format!("%{}%", query.replace('%', "").replace('_', ""));

        let mut stmt = conn
            .prepare(
                "SELECT * FROM content_nodes
                 WHERE company_id = ?1 AND app_id = ?2 AND title LIKE ?3
                 ORDER BY updated_at DESC LIMIT ?4",
            )
            .map_err(|e| store_err("search_by_title", e))?;

        let rows = stmt
            .query_map(params![company_id, app_id, like_pattern, limit as i64], |row| {
                let node = row_to_node(row)?;
                Ok(RelationalHit { node, fts_score: 1.0 })
            })
            .map_err(|e| store_err("search_by_title", e))?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| store_err("search_by_title", e))
    }

    async fn record_version(&self, version: &MemoryVersion) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "INSERT INTO memory_versions (memory_id, version, body, changed_by, change_kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(memory_id, version) DO NOTHING",
            params![
                version.memory_id,
                version.version,
                version.body,
                version.changed_by,
                version.change_kind.to_string(),
                Self::ts(version.created_at),
            ],
        )
        .map_err(|e| store_err("record_version", e))?;
        Ok(())
    }

    async fn get_version(&self, _tenant_id: &str, memory_id: &str, version: i64) -> Result<Option<MemoryVersion>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT memory_id, version, body, changed_by, change_kind, created_at
             FROM memory_versions WHERE memory_id = ?1 AND version = ?2",
            params![memory_id, version],
            |row| {
                let change_kind_str: String = row.get(4)?;
                let created_ts: i64 = row.get(5)?;
                Ok(MemoryVersion {
                    memory_id: row.get(0)?,
                    version: row.get(1)?,
                    body: row.get(2)?,
                    changed_by: row.get(3)?,
                    change_kind: match change_kind_str.as_str() {
                        "create" => crate::domain::ChangeKind::Create,
                        "restore" => crate::domain::ChangeKind::Restore,
                        _ => crate::domain::ChangeKind::Update,
                    },
                    created_at: Utc.timestamp_millis_opt(created_ts).single().unwrap_or_else(Utc::now),
                })
            },
        )
        .optional()
        .map_err(|e| store_err("get_version", e))
    }

    async fn grant_permission(&self, permission: &MemoryPermission) -> Result<()> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        conn.execute(
            "INSERT INTO memory_permissions (memory_id, user_id, role, granted_by, granted_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(memory_id, user_id) DO UPDATE SET
                role = excluded.role,
                granted_by = excluded.granted_by,
                granted_at = excluded.granted_at,
                expires_at = excluded.expires_at",
            params![
                permission.memory_id,
                permission.user_id,
                permission.role.as_str(),
                permission.granted_by,
                Self::ts(permission.granted_at),
                permission.expires_at.map(Self::ts),
            ],
        )
        .map_err(|e| store_err("grant_permission", e))?;
        Ok(())
    }

    async fn get_permission(&self, memory_id: &str, user_id: &str) -> Result<Option<MemoryPermission>> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT memory_id, user_id, role, granted_by, granted_at, expires_at
             FROM memory_permissions WHERE memory_id = ?1 AND user_id = ?2",
            params![memory_id, user_id],
            |row| {
                let role_str: String = row.get(2)?;
                let granted_ts: i64 = row.get(4)?;
                let expires_ts: Option<i64> = row.get(5)?;
                Ok(MemoryPermission {
                    memory_id: row.get(0)?,
                    user_id: row.get(1)?,
                    role: match role_str.as_str() {
                        "admin" => Role::Admin,
                        "write" => Role::Write,
                        _ => Role::Read,
                    },
                    granted_by: row.get(3)?,
                    granted_at: Utc.timestamp_millis_opt(granted_ts).single().unwrap_or_else(Utc::now),
                    expires_at: expires_ts.and_then(|ts| Utc.timestamp_millis_opt(ts).single()),
                })
            },
        )
        .optional()
        .map_err(|e| store_err("get_permission", e))
    }

    async fn idempotency_key_claimed(&self, tenant_id: &str, key: &str) -> Result<bool> {
        let conn = self.reader.lock().expect("reader lock poisoned");
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM idempotency_keys WHERE tenant_id = ?1 AND key = ?2)",
            params![tenant_id, key],
            |row| row.get(0),
        )
        .map_err(|e| store_err("idempotency_key_claimed", e))
    }

    async fn claim_idempotency_key(&self, tenant_id: &str, key: &str) -> Result<bool> {
        let conn = self.writer.lock().expect("writer lock poisoned");
        let inserted = conn
            .execute(
                "INSERT INTO idempotency_keys (tenant_id, key, claimed_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(tenant_id, key) DO NOTHING",
                params![tenant_id, key, Utc::now().timestamp_millis()],
            )
            .map_err(|e| store_err("claim_idempotency_key", e))?;
        Ok(inserted == 1)
    }
}

fn split_tenant_id(tenant_id: &str) -> Result<(&str, &str)> {
    tenant_id
        .split_once(':')
        .ok_or_else(|| CoreError::InvalidIdFormat(format!("tenant_id={tenant_id:?} must be company:app")))
}

//! Store adapter traits.
//!
//! Every backing store the core touches - relational, vector, graph, cache,
//! queue, embeddings - is expressed as an `async_trait` here. Concrete
//! adapters live in sibling modules; the rest of the crate only ever holds
//! `Arc<dyn Trait>`, so tests can swap in in-memory fakes without touching
//! algorithm code.

pub mod cache_store;
pub mod graph_store;
pub mod metrics_store;
pub mod queue_store;
pub mod relational_sqlite;
pub mod vector_store;

use async_trait::async_trait;

use crate::domain::{ContentNode, Entity, MemoryPermission, MemoryVersion, Relationship, RelationshipType, RelevanceMetrics};
use crate::error::Result;

/// A single scored hit from a relational full-text or metadata query.
#[derive(Debug, Clone)]
pub struct RelationalHit {
    pub node: ContentNode,
    pub fts_score: f64,
}

/// Idempotent relational store: the tenant-scoped source of truth for
/// content bodies, metadata, permissions, and version history.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Insert or update by id; must be safe to call twice with identical
    /// input and produce identical stored state (`INSERT ... ON CONFLICT`).
    async fn upsert_node(&self, node: &ContentNode) -> Result<()>;

    async fn get_node(&self, tenant_id: &str, id: &str) -> Result<Option<ContentNode>>;

    async fn delete_node(&self, tenant_id: &str, id: &str) -> Result<()>;

    /// Full-text search scoped to one tenant, ranked by FTS score descending.
    async fn search_fts(&self, tenant_id: &str, query: &str, limit: usize) -> Result<Vec<RelationalHit>>;

    /// Exact-title / metadata-field lookup used by the `title_search` pattern.
    async fn search_by_title(&self, tenant_id: &str, query: &str, limit: usize) -> Result<Vec<RelationalHit>>;

    async fn record_version(&self, version: &MemoryVersion) -> Result<()>;

    async fn get_version(&self, tenant_id: &str, memory_id: &str, version: i64) -> Result<Option<MemoryVersion>>;

    async fn grant_permission(&self, permission: &MemoryPermission) -> Result<()>;

    async fn get_permission(&self, memory_id: &str, user_id: &str) -> Result<Option<MemoryPermission>>;

    /// True if `key` was already committed by a prior *successful*
    /// `WriteSaga::store` call under `tenant_id`. Checked up front so a
    /// retry of a fully-completed write is a no-op; a retry of a write that
    /// failed partway never sees this as `true`, since the key is only
    /// claimed after every step lands (see `claim_idempotency_key`).
    async fn idempotency_key_claimed(&self, tenant_id: &str, key: &str) -> Result<bool>;

    /// Records `key` as consumed; called only after a saga attempt fully
    /// succeeds. Safe to call twice - a second call for an already-claimed
    /// key is a no-op.
    async fn claim_idempotency_key(&self, tenant_id: &str, key: &str) -> Result<bool>;
}

/// A scored vector-similarity hit.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub score: f64,
}

/// Nearest-neighbour vector index, one namespace per tenant.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert an embedding; when `wait` is true the call does not return
    /// until the vector is visible to subsequent `search` calls.
    async fn upsert(&self, tenant_id: &str, id: &str, embedding: &[f32], wait: bool) -> Result<()>;

    async fn search(&self, tenant_id: &str, embedding: &[f32], limit: usize) -> Result<Vec<VectorHit>>;

    async fn delete(&self, tenant_id: &str, id: &str) -> Result<()>;

    async fn contains(&self, tenant_id: &str, id: &str) -> Result<bool>;
}

/// A bounded breadth-first traversal result: node id plus hop distance.
#[derive(Debug, Clone)]
pub struct GraphNeighbor {
    pub id: String,
    pub depth: u32,
    pub relationship_type: RelationshipType,
}

/// In-memory typed property graph: content mirrors, entities, and the
/// relationships ripple recall walks.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create the node if absent; idempotent (`MERGE` semantics).
    async fn merge_node(&self, tenant_id: &str, content_id: &str) -> Result<()>;

    async fn merge_entity(&self, tenant_id: &str, entity: &Entity) -> Result<()>;

    /// Idempotent on `(source_id, target_id, relationship_type)`.
    async fn merge_relationship(&self, tenant_id: &str, relationship: &Relationship) -> Result<()>;

    async fn has_any_relationship(&self, tenant_id: &str, content_id: &str) -> Result<bool>;

    /// Bounded BFS from `start_id` out to `max_depth` hops, following only
    /// the given relationship types.
    async fn bounded_bfs(
        &self,
        tenant_id: &str,
        start_id: &str,
        max_depth: u32,
        types: &[RelationshipType],
    ) -> Result<Vec<GraphNeighbor>>;

    async fn delete_node(&self, tenant_id: &str, content_id: &str) -> Result<()>;
}

/// Concurrent key-value cache with TTL and prefix invalidation.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn setex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key with the given prefix; returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    fn stats(&self) -> CacheStats;
}

/// Point-in-time counters for a [`Cache`] instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A unit of durable background work (decay maintenance, ripple fan-out).
#[derive(Debug, Clone)]
pub struct QueueJob {
    pub id: String,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub max_attempts: u32,
}

/// Durable job queue backing the decay maintenance worker.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn enqueue(&self, job_type: &str, payload: serde_json::Value, max_attempts: u32) -> Result<String>;

    /// Lease the next available job, if any, marking it as in-flight.
    async fn lease_next(&self, job_type: &str) -> Result<Option<QueueJob>>;

    async fn complete(&self, job_id: &str) -> Result<()>;

    /// Mark a lease failed; re-enqueues if `attempts < max_attempts`.
    async fn fail(&self, job_id: &str, error: &str) -> Result<()>;
}

/// Persistence for [`RelevanceMetrics`], batch-read by the decay maintenance
/// job and point-updated after each recall or decay pass.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn upsert(&self, tenant_id: &str, metrics: &RelevanceMetrics) -> Result<()>;

    async fn get(&self, tenant_id: &str, content_id: &str) -> Result<Option<RelevanceMetrics>>;

    /// A page of every metrics row for one tenant, in stable id order, for
    /// batch decay maintenance.
    async fn list_batch(&self, tenant_id: &str, offset: usize, limit: usize) -> Result<Vec<RelevanceMetrics>>;

    async fn update_retrievability(&self, tenant_id: &str, content_id: &str, retrievability: f64) -> Result<()>;

    /// Append a `(stability, recorded_at)` snapshot for later inspection.
    async fn record_stability_snapshot(
        &self,
        tenant_id: &str,
        content_id: &str,
        stability: f64,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()>;
}

/// Text-to-vector embedding provider.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimensions(&self) -> usize;

    fn model_name(&self) -> &str;
}

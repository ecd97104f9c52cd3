//! Multi-store write saga: embed, then fan the content node out to the
//! relational, vector, and graph stores in a fixed order, then verify the
//! vector write is actually visible before reporting success.
//!
//! State machine: `EMBEDDING -> RELATIONAL -> VECTOR -> GRAPH -> VERIFY ->
//! DONE`. Every step is idempotent, so a caller retrying with the same
//! idempotency key after a partial failure converges on the same stored
//! state rather than duplicating anything.

pub mod embedding_cache;

use std::sync::Arc;

use crate::domain::ContentNode;
use crate::error::{AttainedPrefix, CoreError, Result};
use crate::stores::{GraphStore, RelationalStore, VectorStore};

pub use embedding_cache::EmbeddingCache;

/// Outcome of a [`WriteSaga::store`] call.
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    pub id: String,
    pub version: i64,
    /// Set when every step up to and including the graph merge completed,
    /// but the vector write could not be confirmed visible within the
    /// configured retry budget. The data is durably stored; only the
    /// read-your-write guarantee was not met this call.
    pub partial_visibility: bool,
}

/// Coordinates a single content node's write across all backing stores.
pub struct WriteSaga {
    relational: Arc<dyn RelationalStore>,
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    embeddings: Arc<EmbeddingCache>,
    verify_max_retries: u32,
    verify_base_delay: std::time::Duration,
}

impl WriteSaga {
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        embeddings: Arc<EmbeddingCache>,
        verify_max_retries: u32,
        verify_base_delay: std::time::Duration,
    ) -> Self {
        Self { relational, vector, graph, embeddings, verify_max_retries, verify_base_delay }
    }

    /// Stores `node`, deduping on `idempotency_key` within the node's tenant.
    ///
    /// The key is only recorded as claimed once every step below has
    /// landed; a retry of a call that failed partway therefore re-attempts
    /// every step rather than short-circuiting on an incomplete write. Each
    /// step is itself idempotent on `node.id` (`ON CONFLICT` in the
    /// relational/vector/graph stores), so re-running them after a partial
    /// failure converges on the same stored state instead of duplicating it.
    pub async fn store(&self, node: &ContentNode, idempotency_key: &str) -> Result<StoreOutcome> {
        let tenant_id = node.tenant.tenant_id();
        let mut attained = AttainedPrefix::default();

        let already_done = self
            .relational
            .idempotency_key_claimed(&tenant_id, idempotency_key)
            .await
            .map_err(|e| wrap_relational(e, "idempotency_key_claimed", attained))?;
        if already_done {
            return Ok(StoreOutcome { id: node.id.clone(), version: node.version, partial_visibility: false });
        }

        let embedding = self.embeddings.embed(&node.body).await.map_err(|e| match e {
            CoreError::EmbedError { operation, source, .. } => CoreError::EmbedError { operation, source, attained },
            other => CoreError::EmbedError { operation: "embed", source: Box::new(other), attained },
        })?;
        attained.embedded = true;

        self.relational.upsert_node(node).await.map_err(|e| wrap_relational(e, "upsert_node", attained))?;
        attained.relational = true;

        self.vector
            .upsert(&tenant_id, &node.id, &embedding, true)
            .await
            .map_err(|e| wrap_vector(e, "upsert", attained))?;
        attained.vector = true;

        self.graph.merge_node(&tenant_id, &node.id).await.map_err(|e| wrap_graph(e, "merge_node", attained))?;
        attained.graph = true;

        let visible = self.verify_vector_visible(&tenant_id, &node.id).await?;
        if visible {
            attained.verified = true;
        }

        self.relational
            .claim_idempotency_key(&tenant_id, idempotency_key)
            .await
            .map_err(|e| wrap_relational(e, "claim_idempotency_key", attained))?;

        Ok(StoreOutcome { id: node.id.clone(), version: node.version, partial_visibility: !visible })
    }

    /// Polls the vector store for `id`'s presence with exponential backoff,
    /// up to `verify_max_retries` attempts. Returns `false` (never an error)
    /// if the budget is exhausted without confirmation - the write already
    /// landed in every durable store, so this is a degraded read, not a
    /// failure.
    async fn verify_vector_visible(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let mut delay = self.verify_base_delay;
        for attempt in 0..self.verify_max_retries {
            if self.vector.contains(tenant_id, id).await.unwrap_or(false) {
                return Ok(true);
            }
            if attempt + 1 < self.verify_max_retries {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
        Ok(false)
    }
}

fn wrap_relational(source: CoreError, operation: &'static str, attained: AttainedPrefix) -> CoreError {
    CoreError::RelationalError { operation, source: Box::new(source), attained }
}

fn wrap_vector(source: CoreError, operation: &'static str, attained: AttainedPrefix) -> CoreError {
    CoreError::VectorError { operation, source: Box::new(source), attained }
}

fn wrap_graph(source: CoreError, operation: &'static str, attained: AttainedPrefix) -> CoreError {
    CoreError::GraphError { operation, source: Box::new(source), attained }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentVariant, TenantCoordinates};
    use crate::stores::graph_store::InMemoryGraphStore;
    use crate::stores::relational_sqlite::SqliteRelationalStore;
    use crate::stores::vector_store::InMemoryVectorStore;
    use async_trait::async_trait;

    struct FixedEmbeddingProvider;

    #[async_trait]
    impl crate::stores::EmbeddingProvider for FixedEmbeddingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0, 2.0])
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "fixed-test-provider"
        }
    }

    fn coords() -> TenantCoordinates {
        TenantCoordinates { company_id: "acme".into(), app_id: "support".into(), user_id: "u1".into(), session_id: None }
    }

    fn saga() -> (WriteSaga, Arc<SqliteRelationalStore>, Arc<InMemoryVectorStore>) {
        let relational = Arc::new(SqliteRelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        let embeddings = Arc::new(EmbeddingCache::new(Arc::new(FixedEmbeddingProvider)));
        let saga = WriteSaga::new(
            relational.clone(),
            vector.clone(),
            graph,
            embeddings,
            3,
            std::time::Duration::from_millis(1),
        );
        (saga, relational, vector)
    }

    #[tokio::test]
    async fn store_lands_in_every_backing_store() {
        let (saga, relational, vector) = saga();
        let node = ContentNode::new(ContentVariant::Memory, "hello saga world", coords());

        let outcome = saga.store(&node, "key-1").await.unwrap();
        assert!(!outcome.partial_visibility);

        let fetched = relational.get_node("acme:support", &node.id).await.unwrap();
        assert!(fetched.is_some());
        assert!(vector.contains("acme:support", &node.id).await.unwrap());
    }

    #[tokio::test]
    async fn retrying_with_same_idempotency_key_does_not_duplicate() {
        let (saga, relational, _vector) = saga();
        let node = ContentNode::new(ContentVariant::Memory, "idempotent content", coords());

        let first = saga.store(&node, "shared-key").await.unwrap();
        let second = saga.store(&node, "shared-key").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.version, second.version);

        let hits = relational.search_fts("acme:support", "idempotent", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    struct FailOnceVectorStore {
        inner: InMemoryVectorStore,
        failed_once: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl crate::stores::VectorStore for FailOnceVectorStore {
        async fn upsert(&self, tenant_id: &str, id: &str, embedding: &[f32], wait: bool) -> Result<()> {
            if !self.failed_once.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(CoreError::VectorError {
                    operation: "upsert",
                    source: Box::<dyn std::error::Error + Send + Sync>::from("simulated transient failure"),
                    attained: AttainedPrefix::default(),
                });
            }
            self.inner.upsert(tenant_id, id, embedding, wait).await
        }

        async fn search(&self, tenant_id: &str, embedding: &[f32], limit: usize) -> Result<Vec<crate::stores::VectorHit>> {
            self.inner.search(tenant_id, embedding, limit).await
        }

        async fn delete(&self, tenant_id: &str, id: &str) -> Result<()> {
            self.inner.delete(tenant_id, id).await
        }

        async fn contains(&self, tenant_id: &str, id: &str) -> Result<bool> {
            self.inner.contains(tenant_id, id).await
        }
    }

    #[tokio::test]
    async fn retry_after_partial_failure_converges_instead_of_reporting_false_success() {
        let relational = Arc::new(SqliteRelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(FailOnceVectorStore { inner: InMemoryVectorStore::new(), failed_once: std::sync::atomic::AtomicBool::new(false) });
        let graph = Arc::new(InMemoryGraphStore::new());
        let embeddings = Arc::new(EmbeddingCache::new(Arc::new(FixedEmbeddingProvider)));
        let saga = WriteSaga::new(
            relational.clone(),
            vector.clone(),
            graph,
            embeddings,
            3,
            std::time::Duration::from_millis(1),
        );
        let node = ContentNode::new(ContentVariant::Memory, "content that fails its first vector write", coords());

        let first = saga.store(&node, "retry-key").await;
        assert!(first.is_err());
        // The vector write never landed, so the key must not have been
        // claimed - otherwise the retry below would short-circuit and
        // report success for a node that was never indexed.
        assert!(!relational.idempotency_key_claimed("acme:support", "retry-key").await.unwrap());

        let second = saga.store(&node, "retry-key").await.unwrap();
        assert!(!second.partial_visibility);
        assert!(vector.contains("acme:support", &node.id).await.unwrap());
    }

    #[tokio::test]
    async fn distinct_idempotency_keys_both_land() {
        let (saga, relational, _vector) = saga();
        let a = ContentNode::new(ContentVariant::Memory, "first distinct note", coords());
        let b = ContentNode::new(ContentVariant::Memory, "second distinct note", coords());

        saga.store(&a, "key-a").await.unwrap();
        saga.store(&b, "key-b").await.unwrap();

        assert!(relational.get_node("acme:support", &a.id).await.unwrap().is_some());
        assert!(relational.get_node("acme:support", &b.id).await.unwrap().is_some());
    }
}

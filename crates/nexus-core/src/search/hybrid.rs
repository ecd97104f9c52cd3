//! Hybrid search: pattern-directed fusion of vector, metadata, and
//! full-text candidate sets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::domain::ContentVariant;
use crate::error::{CoreError, Result};
use crate::stores::{Cache, EmbeddingProvider, RelationalStore, VectorStore};
use crate::tenant::TenantContext;

use super::pattern::{detect_query_pattern, weights_for};

/// Search-time options, with spec defaults applied by [`SearchOptions::default`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub offset: usize,
    pub score_threshold: f64,
    pub content_type: Option<ContentVariant>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { limit: 20, offset: 0, score_threshold: 0.3, content_type: None }
    }
}

/// Per-source subscores kept for explainability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscores {
    pub vector: f64,
    pub metadata: f64,
    pub fts: f64,
}

/// One fused, ranked hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub variant: ContentVariant,
    pub combined_score: f64,
    pub subscores: Subscores,
}

/// Performance/diagnostic metadata returned alongside a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPerf {
    pub cached: bool,
    pub pattern: String,
    pub elapsed_ms: u64,
}

/// Pagination metadata (§11 supplement: the spec names `pagination` without
/// enumerating its fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub has_more: bool,
    pub limit: usize,
    pub offset: usize,
}

/// Full response shape for `search(query, opts, tenant)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub by_type: HashMap<String, Vec<String>>,
    pub pagination: Pagination,
    pub perf: SearchPerf,
}

/// Fuses vector, metadata, and full-text candidate sets under pattern-
/// selected weights, with an MD5-keyed result cache.
pub struct HybridSearchEngine {
    relational: Arc<dyn RelationalStore>,
    vector: Arc<dyn VectorStore>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    cache: Arc<dyn Cache>,
    config: Config,
}

impl HybridSearchEngine {
    pub fn new(
        config: Config,
        relational: Arc<dyn RelationalStore>,
        vector: Arc<dyn VectorStore>,
        embeddings: Option<Arc<dyn EmbeddingProvider>>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self { relational, vector, embeddings, cache, config }
    }

    fn cache_key(tenant_id: &str, query: &str, opts: &SearchOptions) -> String {
        let digest = md5::compute(format!("{tenant_id}|{query}|{}|{}", opts.limit, opts.offset));
        format!("search:{digest:x}")
    }

    /// `search(query, opts) -> { results, byType, pagination, perf }`.
    pub async fn search(&self, tenant: &TenantContext, query: &str, opts: SearchOptions) -> Result<SearchResponse> {
        let start = Instant::now();
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidQuery("query must not be empty or whitespace".into()));
        }

        let tenant_id = tenant.tenant_id();
        let cache_key = Self::cache_key(&tenant_id, trimmed, &opts);

        if let Some(bytes) = self.cache.get(&cache_key).await? {
            if let Ok(mut cached) = serde_json::from_slice::<SearchResponse>(&bytes) {
                cached.perf.cached = true;
                return Ok(cached);
            }
        }

        let pattern = detect_query_pattern(trimmed);
        let weights = weights_for(pattern, &self.config.search);

        let (vector_hits, metadata_hits, fts_hits) = tokio::join!(
            self.run_vector_search(&tenant_id, trimmed, opts.score_threshold),
            self.run_metadata_search(&tenant_id, trimmed, opts.limit),
            self.run_fts_search(&tenant_id, trimmed, opts.limit),
        );

        let vector_hits = vector_hits.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "vector sub-search failed, degrading to empty set");
            Vec::new()
        });
        let metadata_hits = metadata_hits.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "metadata sub-search failed, degrading to empty set");
            Vec::new()
        });
        let fts_hits = fts_hits.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "fts sub-search failed, degrading to empty set");
            Vec::new()
        });

        let mut merged: HashMap<String, (ContentVariant, Subscores)> = HashMap::new();

        for (id, variant, score) in vector_hits {
            let entry = merged.entry(id).or_insert_with(|| (variant, Subscores::default()));
            entry.1.vector = score;
        }
        for (id, variant, score) in metadata_hits {
            let entry = merged.entry(id).or_insert_with(|| (variant, Subscores::default()));
            entry.1.metadata = entry.1.metadata.max(score);
        }
        for (id, variant, score) in fts_hits {
            let entry = merged.entry(id).or_insert_with(|| (variant, Subscores::default()));
            entry.1.fts = entry.1.fts.max(score);
        }

        let mut hits: Vec<SearchHit> = merged
            .into_iter()
            .map(|(id, (variant, sub))| {
                let combined = sub.vector * weights.vector + sub.metadata * weights.metadata + sub.fts * weights.fts;
                SearchHit { id, variant, combined_score: combined, subscores: sub }
            })
            .collect();

        if let Some(content_type) = opts.content_type {
            hits.retain(|h| h.variant == content_type);
        }

        hits.sort_by(|a, b| {
            b.combined_score
                .partial_cmp(&a.combined_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = hits.len() as u64;
        let has_more = opts.offset + opts.limit < hits.len();
        let page: Vec<SearchHit> = hits.into_iter().skip(opts.offset).take(opts.limit.max(1)).collect();

        let mut by_type: HashMap<String, Vec<String>> = HashMap::new();
        for hit in &page {
            by_type.entry(hit.variant.as_str().to_string()).or_default().push(hit.id.clone());
        }

        let response = SearchResponse {
            results: page,
            by_type,
            pagination: Pagination { total, has_more, limit: opts.limit, offset: opts.offset },
            perf: SearchPerf {
                cached: false,
                pattern: pattern.as_str().to_string(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            },
        };

        if let Ok(bytes) = serde_json::to_vec(&response) {
            let _ = self.cache.setex(&cache_key, bytes, self.config.search.query_cache_ttl.as_secs()).await;
        }

        Ok(response)
    }

    async fn run_vector_search(&self, tenant_id: &str, query: &str, threshold: f64) -> Result<Vec<(String, ContentVariant, f64)>> {
        let Some(embeddings) = &self.embeddings else {
            return Ok(Vec::new());
        };
        let vector = embeddings.embed(query).await?;
        let hits = self.vector.search(tenant_id, &vector, self.config.search.vector_top_k).await?;

        let mut out = Vec::new();
        for hit in hits {
            if hit.score < threshold {
                continue;
            }
            if let Some(node) = self.relational.get_node(tenant_id, &hit.id).await? {
                out.push((hit.id, node.variant, hit.score));
            }
        }
        Ok(out)
    }

    async fn run_metadata_search(&self, tenant_id: &str, query: &str, limit: usize) -> Result<Vec<(String, ContentVariant, f64)>> {
        let hits = self.relational.search_by_title(tenant_id, query, limit).await?;
        Ok(hits.into_iter().map(|h| (h.node.id, h.node.variant, h.fts_score)).collect())
    }

    async fn run_fts_search(&self, tenant_id: &str, query: &str, limit: usize) -> Result<Vec<(String, ContentVariant, f64)>> {
        let hits = self.relational.search_fts(tenant_id, query, limit).await?;
        Ok(hits.into_iter().map(|h| (h.node.id, h.node.variant, h.fts_score)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContentNode, TenantCoordinates};
    use crate::stores::cache_store::DashMapCache;
    use crate::stores::relational_sqlite::SqliteRelationalStore;
    use crate::stores::vector_store::InMemoryVectorStore;

    fn coords() -> TenantCoordinates {
        TenantCoordinates { company_id: "acme".into(), app_id: "support".into(), user_id: "u1".into(), session_id: None }
    }

    async fn engine() -> (HybridSearchEngine, Arc<SqliteRelationalStore>) {
        let relational = Arc::new(SqliteRelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let cache = Arc::new(DashMapCache::new());
        let engine = HybridSearchEngine::new(Config::default(), relational.clone(), vector, None, cache);
        (engine, relational)
    }

    #[tokio::test]
    async fn rejects_empty_query() {
        let (engine, _) = engine().await;
        let tenant = TenantContext::new("acme", "support", "u1").unwrap();
        let err = engine.search(&tenant, "   ", SearchOptions::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidQuery(_)));
    }

    #[tokio::test]
    async fn title_search_beats_semantic_match_on_body_only() {
        let (engine, relational) = engine().await;
        let tenant = TenantContext::new("acme", "support", "u1").unwrap();

        let mut a = ContentNode::new(ContentVariant::Document, "setup steps", coords());
        a.title = Some("Manus.ai integration guide".into());
        relational.upsert_node(&a).await.unwrap();

        let mut b = ContentNode::new(ContentVariant::Document, "integration guide for manus.ai", coords());
        b.title = Some("Unrelated".into());
        relational.upsert_node(&b).await.unwrap();

        let response = engine.search(&tenant, "document titled manus.ai", SearchOptions::default()).await.unwrap();
        assert_eq!(response.perf.pattern, "title_search");
        assert!(!response.results.is_empty());
        assert_eq!(response.results[0].id, a.id);
    }

    #[tokio::test]
    async fn second_identical_search_is_served_from_cache() {
        let (engine, relational) = engine().await;
        let tenant = TenantContext::new("acme", "support", "u1").unwrap();
        let node = ContentNode::new(ContentVariant::Memory, "rust ownership and borrowing", coords());
        relational.upsert_node(&node).await.unwrap();

        let first = engine.search(&tenant, "ownership", SearchOptions::default()).await.unwrap();
        assert!(!first.perf.cached);

        let second = engine.search(&tenant, "ownership", SearchOptions::default()).await.unwrap();
        assert!(second.perf.cached);
    }

    #[tokio::test]
    async fn results_restricted_to_tenant() {
        let (engine, relational) = engine().await;
        let tenant = TenantContext::new("acme", "support", "u1").unwrap();
        let mut other = coords();
        other.company_id = "globex".into();

        let mine = ContentNode::new(ContentVariant::Memory, "shared vocabulary term", coords());
        let theirs = ContentNode::new(ContentVariant::Memory, "shared vocabulary term", other);
        relational.upsert_node(&mine).await.unwrap();
        relational.upsert_node(&theirs).await.unwrap();

        let response = engine.search(&tenant, "vocabulary", SearchOptions::default()).await.unwrap();
        assert!(response.results.iter().all(|h| h.id == mine.id));
    }
}

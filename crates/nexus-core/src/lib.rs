//! # nexus-core
//!
//! Multi-tenant retrieval and relevance core: hybrid search over vector,
//! metadata, and full-text candidates; an Ebbinghaus-curve relevance engine
//! with spaced-repetition-style reinforcement; ripple recall that spreads a
//! recall boost across a typed relationship graph; and an idempotent
//! multi-store write saga that keeps the relational, vector, and graph
//! stores converged under retry.
//!
//! Every backing store is an `async_trait` in [`stores`]; the rest of the
//! crate only ever holds `Arc<dyn Trait>`, so the whole pipeline runs
//! against in-memory fakes in tests and against durable adapters in
//! production with no code change.
//!
//! [`NexusCore`] is the façade: the eight operations named in the external
//! interface are plain async methods on it. A thin CLI binary drives them
//! for local use and demonstration.

#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod decay;
pub mod decay_job;
pub mod domain;
pub mod error;
pub mod relevance;
pub mod ripple;
pub mod saga;
pub mod search;
pub mod stores;
pub mod tenant;
pub mod triage;

#[cfg(feature = "embeddings")]
#[cfg_attr(docsrs, doc(cfg(feature = "embeddings")))]
pub mod embeddings;

use std::sync::Arc;

use chrono::Utc;

use config::Config;
use domain::{AccessKind, ContentNode, ContentVariant, ContextKind, RelevanceMetrics};
use error::{CoreError, Result};
use relevance::cache::ScoreBreakdown;
use relevance::{RelevanceEngine, RetrieveFilter};
use ripple::{PropagationResult, RippleEngine};
use saga::{EmbeddingCache, StoreOutcome, WriteSaga};
use search::{HybridSearchEngine, SearchOptions, SearchResponse};
use stores::{Cache, EmbeddingProvider, GraphStore, MetricsStore, Queue, RelationalStore, VectorStore};
use tenant::TenantContext;

/// Every backing-store adapter the façade needs, grouped for a single
/// constructor call.
pub struct CoreDeps {
    pub relational: Arc<dyn RelationalStore>,
    pub vector: Arc<dyn VectorStore>,
    pub graph: Arc<dyn GraphStore>,
    pub cache: Arc<dyn Cache>,
    pub queue: Arc<dyn Queue>,
    pub metrics: Arc<dyn MetricsStore>,
    pub embeddings: Option<Arc<dyn EmbeddingProvider>>,
}

/// The external interface surface (§6): `search`, `retrieve`, `recordAccess`,
/// `setImportance`, `getScore`, `store`, `propagateBoost`, plus access to
/// the decay-maintenance worker and memory-triage classifier.
pub struct NexusCore {
    config: Config,
    relational: Arc<dyn RelationalStore>,
    metrics: Arc<dyn MetricsStore>,
    hybrid: HybridSearchEngine,
    relevance: RelevanceEngine,
    ripple: Arc<RippleEngine>,
    saga: WriteSaga,
    triage: triage::MemoryTriage,
    decay_job: decay_job::DecayMaintenanceWorker,
}

impl NexusCore {
    pub fn new(config: Config, deps: CoreDeps) -> Self {
        let ripple = Arc::new(RippleEngine::new(config.ripple, deps.graph.clone(), deps.metrics.clone()));
        let relevance = RelevanceEngine::new(&config, deps.relational.clone(), deps.graph.clone(), deps.cache.clone(), ripple.clone());
        let hybrid = HybridSearchEngine::new(
            config.clone(),
            deps.relational.clone(),
            deps.vector.clone(),
            deps.embeddings.clone(),
            deps.cache.clone(),
        );

        let embedding_provider = deps
            .embeddings
            .clone()
            .unwrap_or_else(|| Arc::new(NullEmbeddingProvider { dimensions: config.saga.embedding_dimensions }));
        let embedding_cache = Arc::new(EmbeddingCache::new(embedding_provider));
        let saga = WriteSaga::new(
            deps.relational.clone(),
            deps.vector.clone(),
            deps.graph.clone(),
            embedding_cache,
            config.saga.verify_max_retries,
            config.saga.verify_base_delay,
        );

        let decay_job = decay_job::DecayMaintenanceWorker::new(&config, deps.queue.clone(), deps.metrics.clone(), deps.cache.clone());
        let triage = triage::MemoryTriage::new(config.triage);

        Self {
            config,
            relational: deps.relational,
            metrics: deps.metrics,
            hybrid,
            relevance,
            ripple,
            saga,
            triage,
            decay_job,
        }
    }

    /// `search(query, opts, tenant) -> { results, byType, pagination, perf }`.
    pub async fn search(&self, tenant: &TenantContext, query: &str, opts: SearchOptions) -> Result<SearchResponse> {
        self.hybrid.search(tenant, query, opts).await
    }

    /// `retrieve(opts, tenant) -> nodes with composite score + fallback count`.
    pub async fn retrieve(&self, tenant: &TenantContext, filter: RetrieveFilter) -> Result<relevance::RelevanceResult> {
        let tenant_id = tenant.tenant_id();
        let candidates = self.metrics.list_batch(&tenant_id, filter.offset, filter.limit.max(1) * 4).await?;
        let candidates = self.apply_content_filter(&tenant_id, candidates, &filter).await?;
        self.relevance.retrieve(tenant, "retrieve", candidates, filter).await
    }

    /// Filters `retrieve`'s metrics candidates by content type and tag
    /// intersection, which the metrics store alone can't answer - both
    /// live on the content node, not on [`RelevanceMetrics`].
    async fn apply_content_filter(
        &self,
        tenant_id: &str,
        candidates: Vec<RelevanceMetrics>,
        filter: &RetrieveFilter,
    ) -> Result<Vec<RelevanceMetrics>> {
        if filter.content_type.is_none() && filter.tags.is_empty() {
            return Ok(candidates);
        }

        let mut filtered = Vec::with_capacity(candidates.len());
        for metrics in candidates {
            let Some(node) = self.relational.get_node(tenant_id, &metrics.content_id).await? else {
                continue;
            };
            if let Some(content_type) = filter.content_type {
                if node.variant != content_type {
                    continue;
                }
            }
            if !filter.tags.is_empty() && !filter.tags.iter().all(|t| node.has_tag(t)) {
                continue;
            }
            filtered.push(metrics);
        }
        Ok(filtered)
    }

    /// `recordAccess(node, kind, context, score, tenant) -> updated metrics`.
    pub async fn record_access(
        &self,
        tenant: &TenantContext,
        content_id: &str,
        kind: AccessKind,
        context: ContextKind,
        observed_score: Option<f64>,
    ) -> Result<RelevanceMetrics> {
        let tenant_id = tenant.tenant_id();
        let mut metrics = self
            .metrics
            .get(&tenant_id, content_id)
            .await?
            .ok_or_else(|| CoreError::NodeNotFound(content_id.to_string()))?;

        metrics.has_graph_relationships = self.relevance.has_graph_relationships(tenant, content_id).await?;

        let updated = self
            .relevance
            .record_access(tenant, metrics, &tenant.user_id, kind, context, observed_score)
            .await?;
        self.metrics.upsert(&tenant_id, &updated).await?;
        Ok(updated)
    }

    /// `setImportance(node, value, tenant) -> new importance`.
    pub async fn set_importance(&self, tenant: &TenantContext, content_id: &str, value: f64) -> Result<f64> {
        let value = self.relevance.set_importance(value)?;
        let tenant_id = tenant.tenant_id();
        let mut metrics = self
            .metrics
            .get(&tenant_id, content_id)
            .await?
            .ok_or_else(|| CoreError::NodeNotFound(content_id.to_string()))?;
        metrics.user_importance = Some(value);
        self.metrics.upsert(&tenant_id, &metrics).await?;
        Ok(value)
    }

    /// `getScore(node, tenant) -> score with per-component breakdown + weights + fallback flag`.
    pub async fn get_score(&self, tenant: &TenantContext, content_id: &str) -> Result<ScoreBreakdown> {
        let tenant_id = tenant.tenant_id();
        let metrics = self
            .metrics
            .get(&tenant_id, content_id)
            .await?
            .ok_or_else(|| CoreError::NodeNotFound(content_id.to_string()))?;
        self.relevance.get_score(tenant, &metrics).await
    }

    /// `store(content, embedding_request, idempotency_key, tenant) -> stored ids + partial-visibility flag`.
    pub async fn store(&self, node: &ContentNode, idempotency_key: &str) -> Result<StoreOutcome> {
        let outcome = self.saga.store(node, idempotency_key).await?;
        let tenant_id = node.tenant.tenant_id();
        if self.metrics.get(&tenant_id, &node.id).await?.is_none() {
            self.metrics.upsert(&tenant_id, &RelevanceMetrics::new(node.id.clone())).await?;
        }

        let decision = self.triage.analyze(&node.body);
        tracing::debug!(
            content_id = %node.id,
            needs_entity_extraction = decision.needs_entity_extraction,
            needs_episodic = decision.needs_episodic,
            variant = decision.variant.as_str(),
            confidence = decision.confidence,
            "memory triage decision"
        );

        Ok(outcome)
    }

    /// `propagateBoost(node, tenant) -> { affected_nodes, max_depth_reached, total_boost }`.
    pub async fn propagate_boost(&self, tenant: &TenantContext, content_id: &str) -> Result<PropagationResult> {
        self.ripple.propagate(&tenant.tenant_id(), content_id).await
    }

    /// Runs the decay-maintenance worker's next available job, if any.
    pub async fn run_decay_job(&self) -> Result<Option<decay_job::DecaySummary>> {
        self.decay_job.run_once().await
    }

    /// Schedules a decay-maintenance pass for `tenant`.
    pub async fn schedule_decay_job(&self, tenant: &TenantContext) -> Result<String> {
        self.decay_job.schedule(&tenant.tenant_id()).await
    }

    /// Classifies `text` without writing it, for callers that want a triage
    /// decision ahead of (or instead of) a full `store`.
    pub fn triage(&self, text: &str) -> triage::TriageDecision {
        self.triage.analyze(text)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn relational(&self) -> &Arc<dyn RelationalStore> {
        &self.relational
    }

    /// The variants recognised by the storage layer (used by CLI help text
    /// and input validation).
    pub fn content_variants() -> [ContentVariant; 4] {
        [ContentVariant::Memory, ContentVariant::Document, ContentVariant::Episode, ContentVariant::Chunk]
    }
}

/// Zero-vector stand-in used when no embedding provider is configured, so
/// the write saga can still run end to end (vector search then simply never
/// matches anything, degrading gracefully per §4.2).
struct NullEmbeddingProvider {
    dimensions: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "null-embedding-provider"
    }
}

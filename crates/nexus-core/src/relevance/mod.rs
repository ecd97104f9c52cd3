//! Relevance engine (memory lens): composite scoring, access recording,
//! and relevance-ordered retrieval.

pub mod cache;

use std::sync::Arc;

use chrono::Utc;

use crate::config::{Config, RelevanceWeights};
use crate::decay;
use crate::domain::{AccessEvent, AccessKind, ContextKind, RelevanceMetrics};
use crate::error::{CoreError, Result};
use crate::ripple::RippleEngine;
use crate::stores::{Cache, GraphStore, RelationalStore};
use crate::tenant::TenantContext;

use cache::{ScoreBreakdown, RelevanceScoreCache};

/// Filters applied by [`RelevanceEngine::retrieve`].
#[derive(Debug, Clone, Default)]
pub struct RetrieveFilter {
    pub content_type: Option<crate::domain::ContentVariant>,
    pub tags: Vec<String>,
    pub min_retrievability: Option<f64>,
    pub min_stability: Option<f64>,
    pub min_relevance_score: Option<f64>,
    pub limit: usize,
    pub offset: usize,
    pub use_cache: bool,
}

/// One scored row returned by [`RelevanceEngine::retrieve`] or
/// [`RelevanceEngine::get_score`].
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub node_id: String,
    pub breakdown: ScoreBreakdown,
}

/// Aggregate result of a relevance-ordered retrieval.
#[derive(Debug, Clone)]
pub struct RelevanceResult {
    pub rows: Vec<ScoredNode>,
    pub fallback_node_count: u64,
    pub total: u64,
    pub has_more: bool,
}

/// Composite relevance scoring, access recording, and ripple dispatch.
pub struct RelevanceEngine {
    relational: Arc<dyn RelationalStore>,
    graph: Arc<dyn GraphStore>,
    score_cache: RelevanceScoreCache,
    ripple: Arc<RippleEngine>,
    weights: RelevanceWeights,
    decay_cfg: crate::config::DecayConfig,
    cache_ttl_secs: u64,
}

impl RelevanceEngine {
    pub fn new(
        config: &Config,
        relational: Arc<dyn RelationalStore>,
        graph: Arc<dyn GraphStore>,
        cache: Arc<dyn Cache>,
        ripple: Arc<RippleEngine>,
    ) -> Self {
        Self {
            relational,
            graph,
            score_cache: RelevanceScoreCache::new(cache),
            ripple,
            weights: config.relevance.weights,
            decay_cfg: config.decay,
            cache_ttl_secs: config.relevance.cache_ttl.as_secs(),
        }
    }

    /// The composite score for one node's metrics, optionally given a query
    /// vector similarity. When `vector_similarity` is `None`, the vector
    /// weight is redistributed per §4.4 and `used_fallback` is set.
    pub fn score_metrics(&self, metrics: &RelevanceMetrics, vector_similarity: Option<f64>, at: chrono::DateTime<Utc>) -> ScoreBreakdown {
        let hours = metrics.hours_since_access(at);
        let importance_baseline = metrics.ai_importance.unwrap_or(0.0);
        let retrievability = decay::retrievability(metrics.stability, hours, importance_baseline, self.decay_cfg.tau_hours);

        let (weights, used_fallback) = match vector_similarity {
            Some(_) => (self.weights, false),
            None => (self.weights.without_vector(), true),
        };

        let vector_component = vector_similarity.unwrap_or(0.0) * weights.vector;
        let stability_component = metrics.stability * weights.stability;
        let retrievability_component = retrievability * weights.retrievability;
        let user_component = metrics.user_importance.unwrap_or(0.0) * weights.user_importance;
        let ai_component = metrics.ai_importance.unwrap_or(0.0) * weights.ai_importance;
        let graph_component = if metrics.has_graph_relationships { weights.graph } else { 0.0 };

        let total = vector_component
            + stability_component
            + retrievability_component
            + user_component
            + ai_component
            + graph_component;

        ScoreBreakdown {
            total,
            vector: vector_component,
            stability: stability_component,
            retrievability: retrievability_component,
            user_importance: user_component,
            ai_importance: ai_component,
            graph: graph_component,
            used_fallback,
        }
    }

    /// `getScore(node, tenant)`.
    pub async fn get_score(&self, tenant: &TenantContext, metrics: &RelevanceMetrics) -> Result<ScoreBreakdown> {
        Ok(self.score_metrics(metrics, None, Utc::now()))
        .inspect(|_| tracing::debug!(tenant_id = %tenant.tenant_id(), node_id = %metrics.content_id, "computed score"))
    }

    /// `recordAccess(node, user, kind, context, score, tenant)`.
    ///
    /// Appends the access event, applies the stability boost, invalidates
    /// the tenant's cached scores, and - if the node has graph relationships -
    /// dispatches ripple propagation.
    pub async fn record_access(
        &self,
        tenant: &TenantContext,
        mut metrics: RelevanceMetrics,
        user_id: &str,
        kind: AccessKind,
        context: ContextKind,
        observed_score: Option<f64>,
    ) -> Result<RelevanceMetrics> {
        if let Some(score) = observed_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(CoreError::InvalidRelevanceScore(score));
            }
        }

        let now = Utc::now();
        let hours = metrics.hours_since_access(now);
        let retrievability_at_recall =
            decay::retrievability(metrics.stability, hours, metrics.ai_importance.unwrap_or(0.0), self.decay_cfg.tau_hours);

        let mut event = AccessEvent::new(metrics.content_id.clone(), user_id, kind, context);
        event.observed_score = observed_score;
        event.session_id = tenant.session_id.clone();

        metrics.access_count += 1;
        metrics.last_accessed = now;
        metrics.stability = decay::stability_boost(metrics.stability, retrievability_at_recall);
        metrics.retrievability = retrievability_at_recall;
        metrics.cached_score = None;
        metrics.score_expires_at = None;

        self.score_cache.invalidate_tenant(&tenant.tenant_id()).await?;

        if metrics.has_graph_relationships {
            let content_id = metrics.content_id.clone();
            let ripple = self.ripple.clone();
            let tenant_id = tenant.tenant_id();
            tokio::spawn(async move {
                if let Err(err) = ripple.propagate(&tenant_id, &content_id).await {
                    tracing::warn!(error = %err, content_id = %content_id, "ripple propagation failed");
                }
            });
        }

        tracing::debug!(
            tenant_id = %tenant.tenant_id(),
            node_id = %metrics.content_id,
            access_count = metrics.access_count,
            "recorded access"
        );

        Ok(metrics)
    }

    /// `setImportance(node, value, tenant)`.
    pub fn set_importance(&self, value: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&value) {
            return Err(CoreError::InvalidImportanceValue(value));
        }
        Ok(value)
    }

    /// Checks whether a node has any graph relationships, used to decide the
    /// graph-component weight and ripple eligibility.
    pub async fn has_graph_relationships(&self, tenant: &TenantContext, content_id: &str) -> Result<bool> {
        self.graph.has_any_relationship(&tenant.tenant_id(), content_id).await
    }

    /// `retrieve(opts) -> RelevanceResult`.
    pub async fn retrieve(
        &self,
        tenant: &TenantContext,
        query_for_cache: &str,
        candidates: Vec<RelevanceMetrics>,
        filter: RetrieveFilter,
    ) -> Result<RelevanceResult> {
        let now = Utc::now();
        let mut fallback_node_count = 0u64;
        let mut rows = Vec::with_capacity(candidates.len());

        for metrics in &candidates {
            if let Some(min_r) = filter.min_retrievability {
                if metrics.retrievability < min_r {
                    continue;
                }
            }
            if let Some(min_s) = filter.min_stability {
                if metrics.stability < min_s {
                    continue;
                }
            }

            let breakdown = if filter.use_cache && metrics.cache_is_fresh(now) {
                if let Some(cached) = self
                    .score_cache
                    .get(&tenant.tenant_id(), query_for_cache, &metrics.content_id, now)
                    .await?
                {
                    cached
                } else {
                    fallback_node_count += 1;
                    self.score_metrics(metrics, None, now)
                }
            } else {
                fallback_node_count += 1;
                let computed = self.score_metrics(metrics, None, now);
                self.score_cache
                    .put(&tenant.tenant_id(), query_for_cache, &metrics.content_id, computed.clone(), self.cache_ttl_secs)
                    .await?;
                computed
            };

            if let Some(min_score) = filter.min_relevance_score {
                if breakdown.total < min_score {
                    continue;
                }
            }

            rows.push(ScoredNode { node_id: metrics.content_id.clone(), breakdown });
        }

        rows.sort_by(|a, b| {
            b.breakdown
                .total
                .partial_cmp(&a.breakdown.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });

        let total = rows.len() as u64;
        let has_more = filter.offset + filter.limit < rows.len();
        let page = rows.into_iter().skip(filter.offset).take(filter.limit.max(1)).collect();

        Ok(RelevanceResult { rows: page, fallback_node_count, total, has_more })
    }
}

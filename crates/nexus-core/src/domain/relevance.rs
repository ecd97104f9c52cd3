//! Relevance metrics - the per-node state driving the memory-lens engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decay-model state plus cached score for a single content node.
///
/// `stability` and `retrievability` follow the Ebbinghaus model in
/// [`crate::decay`]; `relevance_score`/`score_expires_at` are a cache entry
/// written by [`crate::relevance`] and must never be trusted past expiry.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelevanceMetrics {
    pub content_id: String,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
    /// Memory stability `S`, in `[0, 1]`. Higher means slower decay.
    pub stability: f64,
    /// Last computed retrievability `R`, in `[0, 1]`.
    pub retrievability: f64,
    /// Explicit user-set importance override, in `[0, 1]`.
    pub user_importance: Option<f64>,
    /// AI-inferred importance, in `[0, 1]`.
    pub ai_importance: Option<f64>,
    /// Whether this node has at least one graph edge (feeds ripple eligibility).
    pub has_graph_relationships: bool,
    pub cached_score: Option<f64>,
    pub score_expires_at: Option<DateTime<Utc>>,
    /// Magnitude of the most recent ripple boost applied to `stability`.
    pub last_boost: Option<f64>,
    /// Count of ripple boosts ever applied to this node.
    pub boost_count: u64,
}

impl RelevanceMetrics {
    pub fn new(content_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            content_id: content_id.into(),
            last_accessed: now,
            access_count: 0,
            stability: 1.0,
            retrievability: 1.0,
            user_importance: None,
            ai_importance: None,
            has_graph_relationships: false,
            cached_score: None,
            score_expires_at: None,
            last_boost: None,
            boost_count: 0,
        }
    }

    pub fn cache_is_fresh(&self, at: DateTime<Utc>) -> bool {
        match (self.cached_score, self.score_expires_at) {
            (Some(_), Some(expiry)) => at < expiry,
            _ => false,
        }
    }

    pub fn hours_since_access(&self, at: DateTime<Utc>) -> f64 {
        (at - self.last_accessed).num_milliseconds() as f64 / 3_600_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cache_requires_both_fields() {
        let mut m = RelevanceMetrics::new("n1");
        assert!(!m.cache_is_fresh(Utc::now()));
        m.cached_score = Some(0.5);
        assert!(!m.cache_is_fresh(Utc::now()));
        m.score_expires_at = Some(Utc::now() + chrono::Duration::minutes(5));
        assert!(m.cache_is_fresh(Utc::now()));
    }

    #[test]
    fn expired_cache_is_not_fresh() {
        let mut m = RelevanceMetrics::new("n1");
        m.cached_score = Some(0.5);
        m.score_expires_at = Some(Utc::now() - chrono::Duration::minutes(5));
        assert!(!m.cache_is_fresh(Utc::now()));
    }
}

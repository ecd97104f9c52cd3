//! Relevance-score cache: `{tenant_id}:{sha256(query)[:16]}` keyed blobs of
//! `{node_id -> score breakdown}`, with tenant-scoped pattern invalidation.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, Result};
use crate::stores::Cache;

/// Per-component breakdown of one node's composite relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub vector: f64,
    pub stability: f64,
    pub retrievability: f64,
    pub user_importance: f64,
    pub ai_importance: f64,
    pub graph: f64,
    pub used_fallback: bool,
}

type ScoreMap = HashMap<String, ScoreBreakdown>;

fn cache_err(operation: &'static str, message: impl std::fmt::Display) -> CoreError {
    CoreError::CacheError {
        operation,
        source: Box::<dyn std::error::Error + Send + Sync>::from(message.to_string()),
    }
}

/// Builds the cache key for a given tenant and query string.
pub fn cache_key(tenant_id: &str, query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    let digest = hasher.finalize();
    let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
    format!("{tenant_id}:{}", &hex[..16])
}

/// The tenant-prefix used to invalidate every cached score under a tenant.
pub fn tenant_prefix(tenant_id: &str) -> String {
    format!("{tenant_id}:")
}

/// Wraps a [`Cache`] with relevance-score-specific (de)serialization.
pub struct RelevanceScoreCache {
    cache: Arc<dyn Cache>,
}

impl RelevanceScoreCache {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    pub async fn get(&self, tenant_id: &str, query: &str, node_id: &str, at: chrono::DateTime<chrono::Utc>) -> Result<Option<ScoreBreakdown>> {
        let _ = at;
        let key = cache_key(tenant_id, query);
        let Some(bytes) = self.cache.get(&key).await? else {
            return Ok(None);
        };
        let map: ScoreMap = serde_json::from_slice(&bytes).map_err(|e| cache_err("get", e))?;
        Ok(map.get(node_id).cloned())
    }

    pub async fn put(&self, tenant_id: &str, query: &str, node_id: &str, score: ScoreBreakdown, ttl_secs: u64) -> Result<()> {
        let key = cache_key(tenant_id, query);
        let mut map: ScoreMap = match self.cache.get(&key).await? {
            Some(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            None => ScoreMap::new(),
        };
        map.insert(node_id.to_string(), score);
        let bytes = serde_json::to_vec(&map).map_err(|e| cache_err("put", e))?;
        self.cache.setex(&key, bytes, ttl_secs).await
    }

    /// Purge every cached score under a tenant; called after any
    /// `recordAccess` (coarse, contract-minimum invalidation per §9).
    pub async fn invalidate_tenant(&self, tenant_id: &str) -> Result<u64> {
        self.cache.delete_prefix(&tenant_prefix(tenant_id)).await
    }

    pub fn stats(&self) -> crate::stores::CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::cache_store::DashMapCache;

    fn breakdown(total: f64) -> ScoreBreakdown {
        ScoreBreakdown {
            total,
            vector: 0.0,
            stability: 0.0,
            retrievability: 0.0,
            user_importance: 0.0,
            ai_importance: 0.0,
            graph: 0.0,
            used_fallback: false,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = RelevanceScoreCache::new(Arc::new(DashMapCache::new()));
        cache.put("acme:support", "hello world", "n1", breakdown(0.75), 300).await.unwrap();

        let got = cache.get("acme:support", "hello world", "n1", chrono::Utc::now()).await.unwrap();
        assert_eq!(got.unwrap().total, 0.75);
    }

    #[tokio::test]
    async fn invalidate_tenant_clears_all_queries_for_that_tenant() {
        let cache = RelevanceScoreCache::new(Arc::new(DashMapCache::new()));
        cache.put("acme:support", "q1", "n1", breakdown(0.1), 300).await.unwrap();
        cache.put("acme:support", "q2", "n2", breakdown(0.2), 300).await.unwrap();
        cache.put("globex:ops", "q1", "n3", breakdown(0.3), 300).await.unwrap();

        cache.invalidate_tenant("acme:support").await.unwrap();

        assert!(cache.get("acme:support", "q1", "n1", chrono::Utc::now()).await.unwrap().is_none());
        assert!(cache.get("globex:ops", "q1", "n3", chrono::Utc::now()).await.unwrap().is_some());
    }

    #[test]
    fn cache_key_is_stable_and_tenant_prefixed() {
        let key = cache_key("acme:support", "hello");
        assert!(key.starts_with("acme:support:"));
        assert_eq!(key, cache_key("acme:support", "hello"));
    }
}

//! Vector similarity store.
//!
//! Backed by `usearch` (an HNSW index) when the `vector-search` feature is
//! enabled, and by a brute-force cosine scan otherwise - the same fallback
//! shape the embedding stack uses when no ANN index is configured.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{AttainedPrefix, CoreError, Result};

use super::{VectorHit, VectorStore};

fn store_err(operation: &'static str, message: impl std::fmt::Display) -> CoreError {
    CoreError::VectorError {
        operation,
        source: Box::<dyn std::error::Error + Send + Sync>::from(message.to_string()),
        attained: AttainedPrefix::default(),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

struct TenantIndex {
    vectors: HashMap<String, Vec<f32>>,
}

/// In-memory nearest-neighbour index, one namespace per tenant.
///
/// `upsert(..., wait=true)` is always immediately visible here - there is no
/// background indexing thread to wait on - which is the simplest possible
/// satisfier of the spec's write-then-read-own-write guarantee.
pub struct InMemoryVectorStore {
    tenants: RwLock<HashMap<String, TenantIndex>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self { tenants: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, tenant_id: &str, id: &str, embedding: &[f32], _wait: bool) -> Result<()> {
        let mut tenants = self.tenants.write().map_err(|_| store_err("upsert", "lock poisoned"))?;
        let index = tenants.entry(tenant_id.to_string()).or_insert_with(|| TenantIndex { vectors: HashMap::new() });
        index.vectors.insert(id.to_string(), embedding.to_vec());
        Ok(())
    }

    async fn search(&self, tenant_id: &str, embedding: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        let tenants = self.tenants.read().map_err(|_| store_err("search", "lock poisoned"))?;
        let Some(index) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = index
            .vectors
            .iter()
            .map(|(id, vec)| VectorHit { id: id.clone(), score: cosine_similarity(embedding, vec) })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, tenant_id: &str, id: &str) -> Result<()> {
        let mut tenants = self.tenants.write().map_err(|_| store_err("delete", "lock poisoned"))?;
        if let Some(index) = tenants.get_mut(tenant_id) {
            index.vectors.remove(id);
        }
        Ok(())
    }

    async fn contains(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let tenants = self.tenants.read().map_err(|_| store_err("contains", "lock poisoned"))?;
        Ok(tenants.get(tenant_id).map(|i| i.vectors.contains_key(id)).unwrap_or(false))
    }
}

/// HNSW-backed vector store via `usearch`, one index per tenant.
///
/// `usearch` keys are `u64`; content ids are opaque strings (UUIDs), so each
/// tenant index carries a bidirectional id<->key map alongside it. Keys are
/// assigned from a monotonic per-tenant counter and never reused, so a
/// `delete` followed by an `upsert` of a different id never collides with a
/// stale key still resident in the HNSW graph.
#[cfg(feature = "vector-search")]
pub struct UsearchVectorStore {
    dimensions: usize,
    tenants: RwLock<HashMap<String, TenantUsearchIndex>>,
}

#[cfg(feature = "vector-search")]
struct TenantUsearchIndex {
    index: usearch::Index,
    id_to_key: HashMap<String, u64>,
    key_to_id: HashMap<u64, String>,
    next_key: u64,
}

#[cfg(feature = "vector-search")]
impl TenantUsearchIndex {
    fn new(dimensions: usize) -> Result<Self> {
        let options = usearch::IndexOptions {
            dimensions,
            metric: usearch::MetricKind::Cos,
            quantization: usearch::ScalarKind::F32,
            connectivity: 0,
            expansion_add: 0,
            expansion_search: 0,
            multi: false,
        };
        let index = usearch::Index::new(&options).map_err(|e| store_err("index_new", e))?;
        index.reserve(1024).map_err(|e| store_err("index_reserve", e))?;
        Ok(Self { index, id_to_key: HashMap::new(), key_to_id: HashMap::new(), next_key: 0 })
    }
}

#[cfg(feature = "vector-search")]
impl UsearchVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, tenants: RwLock::new(HashMap::new()) }
    }
}

#[cfg(feature = "vector-search")]
#[async_trait]
impl VectorStore for UsearchVectorStore {
    async fn upsert(&self, tenant_id: &str, id: &str, embedding: &[f32], _wait: bool) -> Result<()> {
        let mut tenants = self.tenants.write().map_err(|_| store_err("upsert", "lock poisoned"))?;
        let dimensions = self.dimensions;
        let tenant = match tenants.get_mut(tenant_id) {
            Some(t) => t,
            None => {
                tenants.insert(tenant_id.to_string(), TenantUsearchIndex::new(dimensions)?);
                tenants.get_mut(tenant_id).expect("just inserted")
            }
        };

        if let Some(&existing_key) = tenant.id_to_key.get(id) {
            let _ = tenant.index.remove(existing_key);
            tenant.key_to_id.remove(&existing_key);
        }

        if tenant.index.size() + 1 > tenant.index.capacity() {
            tenant.index.reserve(tenant.index.capacity() * 2 + 1).map_err(|e| store_err("reserve", e))?;
        }

        let key = tenant.next_key;
        tenant.next_key += 1;
        tenant.index.add(key, embedding).map_err(|e| store_err("add", e))?;
        tenant.id_to_key.insert(id.to_string(), key);
        tenant.key_to_id.insert(key, id.to_string());
        Ok(())
    }

    async fn search(&self, tenant_id: &str, embedding: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        let tenants = self.tenants.read().map_err(|_| store_err("search", "lock poisoned"))?;
        let Some(tenant) = tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        let matches = tenant.index.search(embedding, limit).map_err(|e| store_err("search", e))?;
        let hits = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .filter_map(|(key, distance)| {
                tenant.key_to_id.get(key).map(|id| VectorHit { id: id.clone(), score: 1.0 - *distance as f64 })
            })
            .collect();
        Ok(hits)
    }

    async fn delete(&self, tenant_id: &str, id: &str) -> Result<()> {
        let mut tenants = self.tenants.write().map_err(|_| store_err("delete", "lock poisoned"))?;
        if let Some(tenant) = tenants.get_mut(tenant_id) {
            if let Some(key) = tenant.id_to_key.remove(id) {
                tenant.key_to_id.remove(&key);
                let _ = tenant.index.remove(key);
            }
        }
        Ok(())
    }

    async fn contains(&self, tenant_id: &str, id: &str) -> Result<bool> {
        let tenants = self.tenants.read().map_err(|_| store_err("contains", "lock poisoned"))?;
        Ok(tenants.get(tenant_id).map(|t| t.id_to_key.contains_key(id)).unwrap_or(false))
    }
}

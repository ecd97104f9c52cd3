//! Content-hash-keyed embedding cache shared by the write saga and hybrid
//! search's query-embedding step.
//!
//! A single `DashMap` behind an `Arc`: writers race on insert via
//! `entry().or_try_insert_with`-style compare-and-set, readers never block.

use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::error::{AttainedPrefix, CoreError, Result};
use crate::stores::EmbeddingProvider;

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Embeds text, short-circuiting through a content-hash cache.
pub struct EmbeddingCache {
    provider: Arc<dyn EmbeddingProvider>,
    entries: DashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider, entries: DashMap::new() }
    }

    /// Returns the cached embedding for `text`'s content hash, computing and
    /// inserting it on miss. Concurrent misses for the same hash both call
    /// the provider; the later write wins, which is harmless since both
    /// calls compute the same deterministic vector for the same text.
    ///
    /// Validates the provider's returned vector against its own declared
    /// `dimensions()` before caching or returning it - a provider that
    /// drifts from its declared dimension must fail loudly here rather than
    /// write a mis-dimensioned vector into the vector store downstream.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = content_hash(text);
        if let Some(existing) = self.entries.get(&hash) {
            return Ok(existing.clone());
        }

        let vector = self.provider.embed(text).await?;
        let expected = self.provider.dimensions();
        if vector.len() != expected {
            return Err(CoreError::EmbedError {
                operation: "embed_dimension_check",
                source: Box::<dyn std::error::Error + Send + Sync>::from(format!(
                    "expected {expected}-dim embedding, provider {} returned {}",
                    self.provider.model_name(),
                    vector.len()
                )),
                attained: AttainedPrefix::default(),
            });
        }

        self.entries.insert(hash, vector.clone());
        Ok(vector)
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }
}

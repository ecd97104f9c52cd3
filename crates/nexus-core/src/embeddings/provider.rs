//! Adapts [`EmbeddingService`] (local fastembed inference) to the core's
//! [`EmbeddingProvider`] trait.

use async_trait::async_trait;

use crate::error::{AttainedPrefix, CoreError, Result};
use crate::stores::EmbeddingProvider;

use super::local::{EmbeddingService, EMBEDDING_DIMENSIONS};

/// Wraps the blocking fastembed service behind the async `EmbeddingProvider`
/// contract, running inference on a blocking-pool thread since ONNX
/// inference is CPU-bound and must not occupy an async worker thread.
pub struct FastEmbedProvider {
    service: EmbeddingService,
}

impl FastEmbedProvider {
    pub fn new() -> Self {
        Self { service: EmbeddingService::new() }
    }
}

impl Default for FastEmbedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.to_string();
        let service = &self.service;
        let embedding = tokio::task::block_in_place(|| service.embed(&text)).map_err(|e| CoreError::EmbedError {
            operation: "fastembed_embed",
            source: Box::new(e),
            attained: AttainedPrefix::default(),
        })?;
        Ok(embedding.vector)
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    fn model_name(&self) -> &str {
        self.service.model_name()
    }
}

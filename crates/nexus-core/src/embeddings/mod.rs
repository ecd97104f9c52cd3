//! Local embedding generation via fastembed (ONNX-based), wrapped behind
//! the core's `EmbeddingProvider` trait. No external API calls - 100%
//! local and private.

mod local;
mod provider;

pub use local::{
    cosine_similarity, dot_product, euclidean_distance, matryoshka_truncate, Embedding,
    EmbeddingError, EmbeddingService, BATCH_SIZE, EMBEDDING_DIMENSIONS, MAX_TEXT_LENGTH,
};
pub use provider::FastEmbedProvider;

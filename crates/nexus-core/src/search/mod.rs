//! Hybrid search (pattern-directed fusion) and advanced semantic search
//! (expansion, rerank, diversify, cluster, insights) layered over it.

pub mod advanced;
pub mod hybrid;
pub mod pattern;

pub use advanced::{
    classify_complexity, classify_intent, cluster, contextual_rerank, diversify, expand_query,
    multi_query_search, synthesize_insight, Cluster, CreatedAtLookup, QueryComplexity, QueryInsight,
    QueryIntent, UserPreferences,
};
pub use hybrid::{HybridSearchEngine, Pagination, SearchHit, SearchOptions, SearchPerf, SearchResponse, Subscores};
pub use pattern::{detect_query_pattern, weights_for, QueryPattern};

//! Error taxonomy for the retrieval and relevance core.
//!
//! Every error surfaced across a public operation boundary is one of:
//! input (caller's fault, never retried), not-found, store (retry is safe
//! because every write is idempotent), or an internal invariant violation.
//! Auxiliary failures (a failed sub-search, a failed ripple hop) are logged
//! and absorbed locally; they never become a `CoreError`.

use thiserror::Error;

/// Which of the three backing stores an operation was touching when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Relational,
    Vector,
    Graph,
    Cache,
    Queue,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StoreKind::Relational => "relational",
            StoreKind::Vector => "vector",
            StoreKind::Graph => "graph",
            StoreKind::Cache => "cache",
            StoreKind::Queue => "queue",
        };
        write!(f, "{s}")
    }
}

/// Which steps of the write saga's state machine completed before a failure.
///
/// Returned alongside every saga error so a caller can decide whether a retry
/// with the same idempotency key is safe (it always is) and what it will do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttainedPrefix {
    pub embedded: bool,
    pub relational: bool,
    pub vector: bool,
    pub graph: bool,
    pub verified: bool,
}

/// Top-level error type returned by every public core operation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CoreError {
    // ---- Input errors: surfaced verbatim, never retried, never an incident ----
    #[error("missing tenant context")]
    MissingTenantContext,

    #[error("invalid id format: {0}")]
    InvalidIdFormat(String),

    #[error("invalid access type: {0}")]
    InvalidAccessType(String),

    #[error("invalid relevance score: {0} (must be in [0, 1])")]
    InvalidRelevanceScore(f64),

    #[error("invalid importance value: {0} (must be in [0, 1])")]
    InvalidImportanceValue(f64),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    // ---- Not-found errors: surfaced verbatim ----
    #[error("content node not found: {0}")]
    NodeNotFound(String),

    #[error("version not found: memory={memory_id} version={version}")]
    VersionNotFound { memory_id: String, version: i64 },

    #[error("permission not found: memory={memory_id} user={user_id}")]
    PermissionNotFound { memory_id: String, user_id: String },

    // ---- Store errors: carry store, operation, attained prefix ----
    #[error("embedding failed during {operation}: {source}")]
    EmbedError {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        attained: AttainedPrefix,
    },

    #[error("relational store failed during {operation}: {source}")]
    RelationalError {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        attained: AttainedPrefix,
    },

    #[error("vector store failed during {operation}: {source}")]
    VectorError {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        attained: AttainedPrefix,
    },

    #[error("graph store failed during {operation}: {source}")]
    GraphError {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        attained: AttainedPrefix,
    },

    #[error("cache store failed during {operation}: {source}")]
    CacheError {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("graph store unavailable for propagateBoost")]
    GraphUnavailable,

    // ---- Cancellation ----
    #[error("operation cancelled before completion (deadline exceeded)")]
    Cancelled,
}

impl CoreError {
    /// True for errors that must never be logged as an incident or retried
    /// automatically by the core itself.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CoreError::MissingTenantContext
                | CoreError::InvalidIdFormat(_)
                | CoreError::InvalidAccessType(_)
                | CoreError::InvalidRelevanceScore(_)
                | CoreError::InvalidImportanceValue(_)
                | CoreError::InvalidQuery(_)
        )
    }

    /// The attained prefix of a write-saga attempt, if this error came from one.
    pub fn attained_prefix(&self) -> Option<AttainedPrefix> {
        match self {
            CoreError::EmbedError { attained, .. }
            | CoreError::RelationalError { attained, .. }
            | CoreError::VectorError { attained, .. }
            | CoreError::GraphError { attained, .. } => Some(*attained),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

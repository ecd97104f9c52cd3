//! Access events - the observations that drive relevance decay and boost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::MetadataMap;
use crate::error::CoreError;

/// What kind of interaction an access event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    Retrieve,
    View,
    Edit,
    Share,
}

impl AccessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessKind::Retrieve => "retrieve",
            AccessKind::View => "view",
            AccessKind::Edit => "edit",
            AccessKind::Share => "share",
        }
    }

    pub fn parse_name(s: &str) -> Result<Self, CoreError> {
        match s.to_lowercase().as_str() {
            "retrieve" => Ok(AccessKind::Retrieve),
            "view" => Ok(AccessKind::View),
            "edit" => Ok(AccessKind::Edit),
            "share" => Ok(AccessKind::Share),
            other => Err(CoreError::InvalidAccessType(other.to_string())),
        }
    }

    /// Stability-boost weight; edits and shares signal stronger reinforcement
    /// than a passive retrieve or view.
    pub fn boost_weight(&self) -> f64 {
        match self {
            AccessKind::Retrieve => 1.0,
            AccessKind::View => 0.6,
            AccessKind::Edit => 1.4,
            AccessKind::Share => 1.2,
        }
    }
}

impl std::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The context an access happened in, used by the triage heuristics and
/// by downstream analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Query,
    Related,
    Manual,
    System,
}

impl ContextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextKind::Query => "query",
            ContextKind::Related => "related",
            ContextKind::Manual => "manual",
            ContextKind::System => "system",
        }
    }
}

impl std::fmt::Display for ContextKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single recorded interaction with a content node.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessEvent {
    pub id: String,
    pub content_id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub kind: AccessKind,
    pub context: ContextKind,
    /// The relevance score observed by the caller at access time, if any
    /// (e.g. the score this node had in the search result list clicked).
    pub observed_score: Option<f64>,
    pub metadata: MetadataMap,
    pub occurred_at: DateTime<Utc>,
}

impl AccessEvent {
    pub fn new(content_id: impl Into<String>, user_id: impl Into<String>, kind: AccessKind, context: ContextKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_id: content_id.into(),
            user_id: user_id.into(),
            session_id: None,
            kind,
            context,
            observed_score: None,
            metadata: MetadataMap::new(),
            occurred_at: Utc::now(),
        }
    }
}

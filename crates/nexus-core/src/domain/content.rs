//! Content node - the fundamental unit of storage and retrieval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A scalar or list value in a free-form metadata map.
///
/// Preserves the source's dynamic record types at interface boundaries:
/// algorithms never pattern-match on unknown keys, only on this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<MetadataValue>),
}

/// Opaque metadata map carried on content nodes, access events, and edges.
pub type MetadataMap = HashMap<String, MetadataValue>;

/// Content variant - exactly one per node, part of its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentVariant {
    Memory,
    Document,
    Episode,
    Chunk,
}

impl ContentVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentVariant::Memory => "memory",
            ContentVariant::Document => "document",
            ContentVariant::Episode => "episode",
            ContentVariant::Chunk => "chunk",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Some(ContentVariant::Memory),
            "document" => Some(ContentVariant::Document),
            "episode" => Some(ContentVariant::Episode),
            "chunk" => Some(ContentVariant::Chunk),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tenant coordinates owning a content node, plus the user and optional
/// session under which it was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCoordinates {
    pub company_id: String,
    pub app_id: String,
    pub user_id: String,
    pub session_id: Option<String>,
}

impl TenantCoordinates {
    pub fn tenant_id(&self) -> String {
        format!("{}:{}", self.company_id, self.app_id)
    }

    pub fn owns(&self, other: &TenantCoordinates) -> bool {
        self.company_id == other.company_id && self.app_id == other.app_id
    }
}

/// The unit of storage and retrieval: a memory, document, episode, or chunk.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub id: String,
    pub variant: ContentVariant,
    pub body: String,
    pub metadata: MetadataMap,
    pub tags: Vec<String>,
    pub tenant: TenantCoordinates,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub embedding_model: Option<String>,
    pub hierarchy_level: i32,
    pub parent_id: Option<String>,
    /// Title, when present, is what title_search patterns match against.
    pub title: Option<String>,
    /// Provenance source (URL, file path, conversation id, ...).
    pub source: Option<String>,
    /// Monotonic version number; bumped on every edit, starts at 1.
    pub version: i64,
}

impl ContentNode {
    pub fn new(variant: ContentVariant, body: impl Into<String>, tenant: TenantCoordinates) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            variant,
            body: body.into(),
            metadata: MetadataMap::new(),
            tags: Vec::new(),
            tenant,
            created_at: now,
            updated_at: now,
            embedding_model: None,
            hierarchy_level: 0,
            parent_id: None,
            title: None,
            source: None,
            version: 1,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> TenantCoordinates {
        TenantCoordinates {
            company_id: "acme".into(),
            app_id: "support".into(),
            user_id: "u1".into(),
            session_id: None,
        }
    }

    #[test]
    fn new_node_has_version_one() {
        let node = ContentNode::new(ContentVariant::Memory, "hello", coords());
        assert_eq!(node.version, 1);
        assert_eq!(node.tenant.tenant_id(), "acme:support");
    }

    #[test]
    fn variant_roundtrips() {
        for v in [
            ContentVariant::Memory,
            ContentVariant::Document,
            ContentVariant::Episode,
            ContentVariant::Chunk,
        ] {
            assert_eq!(ContentVariant::parse_name(v.as_str()), Some(v));
        }
    }

    #[test]
    fn owns_checks_tenant_tuple_only() {
        let a = coords();
        let mut b = coords();
        b.user_id = "u2".into();
        assert!(a.owns(&b));
        b.app_id = "other-app".into();
        assert!(!a.owns(&b));
    }
}

//! Graph-facing entities, relationships, and the memory-graph node mirror.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::MetadataMap;

/// A named thing the graph store can relate content to (a person, a topic,
/// a project, ...). Distinct from [`Memory`], which mirrors a content node.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub metadata: MetadataMap,
}

/// Edge type between two graph nodes, used by ripple recall's typed BFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationshipType {
    Temporal,
    Causal,
    Mentions,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Temporal => "TEMPORAL",
            RelationshipType::Causal => "CAUSAL",
            RelationshipType::Mentions => "MENTIONS",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "TEMPORAL" => Some(RelationshipType::Temporal),
            "CAUSAL" => Some(RelationshipType::Causal),
            "MENTIONS" => Some(RelationshipType::Mentions),
            _ => None,
        }
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed, typed, weighted edge between two graph node ids.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: RelationshipType,
    pub weight: f64,
    pub metadata: MetadataMap,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, relationship_type: RelationshipType) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship_type,
            weight: 1.0,
            metadata: MetadataMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// A graph-store mirror of a content node, carrying optional geolocation
/// used by location-aware ripple boosts.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: String,
    pub content_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_type_roundtrips() {
        for t in [
            RelationshipType::Temporal,
            RelationshipType::Causal,
            RelationshipType::Mentions,
        ] {
            assert_eq!(RelationshipType::parse_name(t.as_str()), Some(t));
        }
    }

    #[test]
    fn new_relationship_defaults_to_unit_weight() {
        let r = Relationship::new("a", "b", RelationshipType::Causal);
        assert_eq!(r.weight, 1.0);
    }
}

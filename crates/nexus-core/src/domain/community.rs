//! Entity communities - coarse clusters surfaced by graph analytics.

use serde::{Deserialize, Serialize};

/// A cluster of related entities, possibly nested under a parent community.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Community {
    pub id: String,
    pub name: String,
    pub entity_ids: Vec<String>,
    /// Hierarchy depth; 0 is the coarsest level.
    pub level: i32,
    pub parent_id: Option<String>,
    pub children_ids: Vec<String>,
    pub member_count: u64,
    pub keywords: Vec<String>,
}

impl Community {
    pub fn new(name: impl Into<String>, level: i32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            entity_ids: Vec::new(),
            level,
            parent_id: None,
            children_ids: Vec::new(),
            member_count: 0,
            keywords: Vec::new(),
        }
    }

    pub fn add_member(&mut self, entity_id: impl Into<String>) {
        self.entity_ids.push(entity_id.into());
        self.member_count = self.entity_ids.len() as u64;
    }
}

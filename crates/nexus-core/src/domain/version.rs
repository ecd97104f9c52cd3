//! Immutable version snapshots for edited memories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of edit produced a version snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Restore,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Restore => "restore",
        };
        write!(f, "{s}")
    }
}

/// An immutable snapshot of a memory's body at a point in its edit history.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryVersion {
    pub memory_id: String,
    pub version: i64,
    pub body: String,
    pub changed_by: String,
    pub change_kind: ChangeKind,
    pub created_at: DateTime<Utc>,
}

//! Edge types for the tree graph.
//!
//! The schema is fixed: trees are parent-pointer arborescences, sources
//! point at the roots they own, and a local source may point at the remote
//! source it copies.

use serde::{Deserialize, Serialize};

/// The type of relationship between two graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Child node points at its parent.
    ChildOf,

    /// Source metadata node points at a tree root it owns.
    MetadataFor,

    /// Local source points at the remote source with the same id.
    IsLocalCopyOf,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ChildOf => "child_of",
            Self::MetadataFor => "metadata_for",
            Self::IsLocalCopyOf => "is_local_copy_of",
        };
        write!(f, "{}", s)
    }
}

/// An edge in the tree graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// The kind of relationship.
    pub kind: EdgeKind,

    /// Creation ordinal. Edges of one kind into a node are read back in
    /// ascending order, which keeps children in insertion order.
    pub order: u64,
}

impl Edge {
    /// Creates a new edge.
    pub fn new(kind: EdgeKind, order: u64) -> Self {
        Self { kind, order }
    }
}

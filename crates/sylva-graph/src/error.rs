//! Error taxonomy for the graph engine.

use crate::graph::NodeId;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    /// No tree, source or node for the given id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A uniqueness lookup returned more than one hit, or a single-edge
    /// lookup found several edges.
    #[error("Database is probably corrupt: {0}")]
    Corruption(String),

    /// The request would merge into or collide with existing data.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// A mutation would break the tree shape (cycle, second parent,
    /// dangling edge).
    #[error("Invalid tree structure: {0}")]
    InvalidStructure(String),

    #[error("Invalid index registry: {0}")]
    InvalidRegistry(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    pub fn tree_not_found(tree_id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "tree",
            id: tree_id.into(),
        }
    }

    pub fn source_not_found(source_id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "source",
            id: source_id.into(),
        }
    }

    pub fn node_not_found(node: NodeId) -> Self {
        Self::NotFound {
            kind: "node",
            id: node.index().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;

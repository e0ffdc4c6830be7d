use crate::edge::Edge;
use crate::graph::{GraphState, NodeId};
use crate::index::IndexSet;
use crate::node::{GraphNode, TreeNodeData};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

const GRAPH_KEY: &str = "main_graph";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Stored graph is inconsistent: {0}")]
    Inconsistent(String),
}

/// On-disk form of a [`GraphState`].
///
/// Node ids are written explicitly so the indexes, which refer to nodes by
/// id, stay valid after a reload even when the graph has holes left by
/// deletions.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedGraph {
    nodes: Vec<(u32, GraphNode)>,
    edges: Vec<(u32, u32, Edge)>,
    indexes: IndexSet,
    next_order: u64,
}

impl PersistedGraph {
    fn capture(state: &GraphState) -> Self {
        let nodes = state
            .graph
            .node_indices()
            .filter_map(|id| Some((id.index() as u32, state.graph.node_weight(id)?.clone())))
            .collect();
        let edges = state
            .graph
            .edge_references()
            .map(|e| (e.source().index() as u32, e.target().index() as u32, *e.weight()))
            .collect();
        Self {
            nodes,
            edges,
            indexes: state.indexes.clone(),
            next_order: state.next_order,
        }
    }

    fn restore(self) -> Result<GraphState, StoreError> {
        let mut state = GraphState::new();
        let mut nodes = self.nodes;
        nodes.sort_by_key(|(id, _)| *id);

        // Fill holes with placeholders so every node lands on its old id,
        // then free the placeholders.
        let mut placeholders = Vec::new();
        for (id, weight) in nodes {
            while state.graph.node_count() < id as usize {
                placeholders.push(state.graph.add_node(GraphNode::Tree(TreeNodeData::default())));
            }
            let assigned = state.graph.add_node(weight);
            if assigned.index() != id as usize {
                return Err(StoreError::Inconsistent(format!(
                    "node {} restored as {}",
                    id,
                    assigned.index()
                )));
            }
        }
        for placeholder in placeholders {
            state.graph.remove_node(placeholder);
        }

        for (from, to, edge) in self.edges {
            let (from, to) = (NodeId::new(from as usize), NodeId::new(to as usize));
            if !state.graph.contains_node(from) || !state.graph.contains_node(to) {
                return Err(StoreError::Inconsistent(format!(
                    "edge {} -> {} has a missing endpoint",
                    from.index(),
                    to.index()
                )));
            }
            state.graph.add_edge(from, to, edge);
        }
        state.indexes = self.indexes;
        state.next_order = self.next_order;
        Ok(state)
    }
}

pub struct GraphStore {
    db: Db,
}

impl GraphStore {
    /// Opens or creates a graph store at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Saves the whole graph, indexes included, under a fixed key.
    pub fn save_state(&self, state: &GraphState) -> Result<(), StoreError> {
        let bytes = bincode::serialize(&PersistedGraph::capture(state))?;
        debug!("saving graph ({} bytes)", bytes.len());
        self.db.insert(GRAPH_KEY, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Loads the graph from the store.
    pub fn load_state(&self) -> Result<Option<GraphState>, StoreError> {
        if let Some(bytes) = self.db.get(GRAPH_KEY)? {
            let persisted: PersistedGraph = bincode::deserialize(&bytes)?;
            Ok(Some(persisted.restore()?))
        } else {
            Ok(None)
        }
    }

    /// Clears the stored graph.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.db.remove(GRAPH_KEY)?;
        self.db.flush()?;
        Ok(())
    }
}

//! Graph access layer.
//!
//! `GraphState` wraps a petgraph arena together with the secondary indexes.
//! Node ids are stable across deletions, which lets the indexes refer to
//! nodes by id. Every structural primitive checks its preconditions and
//! reports a typed error instead of leaving a dangling edge behind.

use crate::edge::{Edge, EdgeKind};
use crate::error::{GraphError, Result};
use crate::index::IndexSet;
use crate::node::{GraphNode, SourceMeta, TreeNodeData, TreeRoot};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Unique identifier for a node in the graph.
pub type NodeId = NodeIndex;

/// Unique identifier for an edge in the graph.
pub type EdgeId = EdgeIndex;

/// A resolved edge: id, endpoints and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeInfo {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// The tree graph plus its secondary indexes.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    pub(crate) graph: StableDiGraph<GraphNode, Edge>,
    pub(crate) indexes: IndexSet,
    pub(crate) next_order: u64,
}

impl GraphState {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.graph.contains_node(node)
    }

    pub fn create_node(&mut self, weight: GraphNode) -> NodeId {
        self.graph.add_node(weight)
    }

    /// Deletes a node that has no edges and no index entries left.
    pub fn delete_node(&mut self, node: NodeId) -> Result<GraphNode> {
        if !self.contains(node) {
            return Err(GraphError::node_not_found(node));
        }
        let remaining = self.edges_touching(node).len();
        if remaining > 0 {
            return Err(GraphError::InvalidStructure(format!(
                "node {} still has {} edge(s)",
                node.index(),
                remaining
            )));
        }
        if self.indexes.references(node) {
            return Err(GraphError::InvalidStructure(format!(
                "node {} is still indexed",
                node.index()
            )));
        }
        self.graph
            .remove_node(node)
            .ok_or_else(|| GraphError::node_not_found(node))
    }

    /// Creates an edge from `from` to `to`.
    pub fn create_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) -> Result<EdgeId> {
        for endpoint in [from, to] {
            if !self.contains(endpoint) {
                return Err(GraphError::node_not_found(endpoint));
            }
        }
        let order = self.next_order;
        self.next_order += 1;
        Ok(self.graph.add_edge(from, to, Edge::new(kind, order)))
    }

    pub fn delete_edge(&mut self, edge: EdgeId) -> Result<()> {
        self.graph.remove_edge(edge).map(|_| ()).ok_or_else(|| GraphError::NotFound {
            kind: "edge",
            id: edge.index().to_string(),
        })
    }

    /// Moves an edge onto new endpoints. Kind and ordinal are kept, so the
    /// edge keeps its place among its siblings.
    pub fn retarget_edge(&mut self, edge: EdgeId, from: NodeId, to: NodeId) -> Result<EdgeId> {
        for endpoint in [from, to] {
            if !self.contains(endpoint) {
                return Err(GraphError::node_not_found(endpoint));
            }
        }
        let weight = self.graph.remove_edge(edge).ok_or_else(|| GraphError::NotFound {
            kind: "edge",
            id: edge.index().to_string(),
        })?;
        Ok(self.graph.add_edge(from, to, weight))
    }

    /// Edges of `node` in one direction, optionally filtered by kind,
    /// in creation order.
    pub fn edges_of(&self, node: NodeId, kind: Option<EdgeKind>, direction: Direction) -> Vec<EdgeInfo> {
        if !self.contains(node) {
            return Vec::new();
        }
        let mut found: Vec<(u64, EdgeInfo)> = self
            .graph
            .edges_directed(node, direction)
            .filter(|e| kind.map_or(true, |k| e.weight().kind == k))
            .filter_map(|e| {
                let (source, target) = self.graph.edge_endpoints(e.id())?;
                Some((
                    e.weight().order,
                    EdgeInfo {
                        id: e.id(),
                        source,
                        target,
                        kind: e.weight().kind,
                    },
                ))
            })
            .collect();
        found.sort_by_key(|(order, _)| *order);
        found.into_iter().map(|(_, info)| info).collect()
    }

    /// Every edge with `node` as an endpoint.
    pub fn edges_touching(&self, node: NodeId) -> Vec<EdgeInfo> {
        let mut out = self.edges_of(node, None, Direction::Outgoing);
        for edge in self.edges_of(node, None, Direction::Incoming) {
            // self loops show up in both directions
            if !out.iter().any(|e| e.id == edge.id) {
                out.push(edge);
            }
        }
        out
    }

    /// The only edge of `kind` in `direction`, if any.
    pub fn single_edge(&self, node: NodeId, kind: EdgeKind, direction: Direction) -> Result<Option<EdgeInfo>> {
        let edges = self.edges_of(node, Some(kind), direction);
        if edges.len() > 1 {
            return Err(GraphError::Corruption(format!(
                "node {} has {} {:?} {} edges, expected at most one",
                node.index(),
                edges.len(),
                direction,
                kind
            )));
        }
        Ok(edges.into_iter().next())
    }

    pub fn node(&self, node: NodeId) -> Result<&GraphNode> {
        self.graph
            .node_weight(node)
            .ok_or_else(|| GraphError::node_not_found(node))
    }

    pub fn node_mut(&mut self, node: NodeId) -> Result<&mut GraphNode> {
        self.graph
            .node_weight_mut(node)
            .ok_or_else(|| GraphError::node_not_found(node))
    }

    pub fn tree_data(&self, node: NodeId) -> Result<&TreeNodeData> {
        self.node(node)?.as_tree().ok_or(GraphError::NotFound {
            kind: "tree node",
            id: node.index().to_string(),
        })
    }

    pub fn tree_data_mut(&mut self, node: NodeId) -> Result<&mut TreeNodeData> {
        self.node_mut(node)?.as_tree_mut().ok_or(GraphError::NotFound {
            kind: "tree node",
            id: node.index().to_string(),
        })
    }

    pub fn tree_root(&self, node: NodeId) -> Result<&TreeRoot> {
        self.tree_data(node)?
            .root
            .as_deref()
            .ok_or(GraphError::NotFound {
                kind: "tree root",
                id: node.index().to_string(),
            })
    }

    pub fn tree_root_mut(&mut self, node: NodeId) -> Result<&mut TreeRoot> {
        self.tree_data_mut(node)?
            .root
            .as_deref_mut()
            .ok_or(GraphError::NotFound {
                kind: "tree root",
                id: node.index().to_string(),
            })
    }

    pub fn source_meta(&self, node: NodeId) -> Result<&SourceMeta> {
        self.node(node)?.as_source().ok_or(GraphError::NotFound {
            kind: "source",
            id: node.index().to_string(),
        })
    }

    pub fn source_meta_mut(&mut self, node: NodeId) -> Result<&mut SourceMeta> {
        self.node_mut(node)?.as_source_mut().ok_or(GraphError::NotFound {
            kind: "source",
            id: node.index().to_string(),
        })
    }

    /// The parent of a tree node, following its child-of edge.
    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>> {
        Ok(self
            .single_edge(node, EdgeKind::ChildOf, Direction::Outgoing)?
            .map(|e| e.target))
    }

    /// Children of a tree node in insertion order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.edges_of(node, Some(EdgeKind::ChildOf), Direction::Incoming)
            .into_iter()
            .map(|e| e.source)
            .collect()
    }

    /// Follows child-of edges from `node` to the end of the chain.
    pub fn root_of(&self, node: NodeId) -> Result<NodeId> {
        self.tree_data(node)?;
        let mut current = node;
        let mut steps = 0usize;
        while let Some(parent) = self.parent(current)? {
            steps += 1;
            if steps > self.graph.node_count() {
                return Err(GraphError::InvalidStructure(format!(
                    "cycle above node {}",
                    node.index()
                )));
            }
            current = parent;
        }
        Ok(current)
    }

    /// Collects `start` and every node reachable along `kind` edges in
    /// `direction`, breadth first or depth first.
    pub fn traverse(&self, start: NodeId, kind: EdgeKind, direction: Direction, breadth_first: bool) -> Vec<NodeId> {
        if !self.contains(start) {
            return Vec::new();
        }
        let mut visited = HashSet::new();
        let mut pending = VecDeque::new();
        let mut out = Vec::new();
        pending.push_back(start);
        visited.insert(start);

        loop {
            let next = if breadth_first {
                pending.pop_front()
            } else {
                pending.pop_back()
            };
            let Some(current) = next else { break };
            out.push(current);
            let mut next: Vec<NodeId> = self
                .edges_of(current, Some(kind), direction)
                .into_iter()
                .map(|e| if direction == Direction::Incoming { e.source } else { e.target })
                .collect();
            if !breadth_first {
                // keep left-to-right order when popping from the back
                next.reverse();
            }
            for neighbor in next {
                if visited.insert(neighbor) {
                    pending.push_back(neighbor);
                }
            }
        }
        out
    }

    /// Every node of the tree rooted at `root`, breadth first.
    pub fn tree_nodes(&self, root: NodeId) -> Vec<NodeId> {
        self.traverse(root, EdgeKind::ChildOf, Direction::Incoming, true)
    }

    /// Validates that the tree below `root` is a simple arborescence.
    pub fn check_tree(&self, root: NodeId) -> Result<()> {
        self.tree_root(root)?;
        if let Some(parent) = self.parent(root)? {
            return Err(GraphError::InvalidStructure(format!(
                "root {} has parent {}",
                root.index(),
                parent.index()
            )));
        }

        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(root);
        queue.push_back(root);
        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                if !seen.insert(child) {
                    return Err(GraphError::InvalidStructure(format!(
                        "node {} is reachable twice below root {}",
                        child.index(),
                        root.index()
                    )));
                }
                let data = self.tree_data(child)?;
                if data.is_root() {
                    return Err(GraphError::InvalidStructure(format!(
                        "node {} below root {} is flagged as a root",
                        child.index(),
                        root.index()
                    )));
                }
                let parents = self
                    .edges_of(child, Some(EdgeKind::ChildOf), Direction::Outgoing)
                    .len();
                if parents != 1 {
                    return Err(GraphError::InvalidStructure(format!(
                        "node {} has {} parents",
                        child.index(),
                        parents
                    )));
                }
                queue.push_back(child);
            }
        }
        debug!("checked tree at {} ({} nodes)", root.index(), seen.len());
        Ok(())
    }

    pub fn indexes(&self) -> &IndexSet {
        &self.indexes
    }

    pub fn indexes_mut(&mut self) -> &mut IndexSet {
        &mut self.indexes
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Iterates over all node indexes.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices()
    }

    /// All edges in the graph.
    pub fn edges(&self) -> Vec<EdgeInfo> {
        self.graph
            .edge_references()
            .map(|e| EdgeInfo {
                id: e.id(),
                source: e.source(),
                target: e.target(),
                kind: e.weight().kind,
            })
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            sources: 0,
            trees: 0,
        };
        for weight in self.graph.node_weights() {
            match weight {
                GraphNode::Source(_) => stats.sources += 1,
                GraphNode::Tree(data) if data.is_root() => stats.trees += 1,
                GraphNode::Tree(_) => {}
            }
        }
        stats
    }
}

/// Graph statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub sources: usize,
    pub trees: usize,
}

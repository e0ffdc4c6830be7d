//! Deleting trees and sources.

use crate::edge::EdgeKind;
use crate::error::Result;
use crate::graph::{GraphState, NodeId};
use crate::registry::{remove_source_meta_from_indexes, remove_tree_root_from_indexes};
use petgraph::Direction;
use tracing::info;

/// Deletes a tree: its index entries, every node below `root` and every
/// edge touching those nodes. Returns the number of nodes removed.
pub fn delete_tree(state: &mut GraphState, root: NodeId) -> Result<usize> {
    let tree_id = state.tree_root(root)?.tree_id.clone();
    state.check_tree(root)?;
    remove_tree_root_from_indexes(state, root);

    let nodes = state.tree_nodes(root);
    for &node in &nodes {
        for edge in state.edges_touching(node) {
            state.delete_edge(edge.id)?;
        }
    }
    for &node in &nodes {
        state.delete_node(node)?;
    }

    info!("Deleted tree {} ({} nodes)", tree_id, nodes.len());
    Ok(nodes.len())
}

/// Deletes a source together with all of its trees. Returns the number of
/// trees removed.
pub fn delete_source(state: &mut GraphState, source: NodeId) -> Result<usize> {
    let source_id = state.source_meta(source)?.source_id.clone();
    remove_source_meta_from_indexes(state, source);

    let roots: Vec<NodeId> = state
        .edges_of(source, Some(EdgeKind::MetadataFor), Direction::Outgoing)
        .into_iter()
        .map(|edge| edge.target)
        .collect();
    for &root in &roots {
        delete_tree(state, root)?;
    }
    for edge in state.edges_touching(source) {
        state.delete_edge(edge.id)?;
    }
    state.delete_node(source)?;

    info!("Deleted source {} ({} trees)", source_id, roots.len());
    Ok(roots.len())
}

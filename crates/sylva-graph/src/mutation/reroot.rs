//! Rerooting a persisted tree.

use super::{attach, detach};
use crate::edge::EdgeKind;
use crate::error::{GraphError, Result};
use crate::graph::{GraphState, NodeId};
use crate::node::{GraphNode, TreeNodeData};
use crate::registry::{add_tree_root_to_indexes, remove_tree_root_from_indexes};
use petgraph::Direction;
use tracing::{debug, info, warn};

/// Result of a reroot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerootOutcome {
    /// The requested node already was the root; only `rooting_is_set`
    /// was updated.
    AlreadyRoot(NodeId),

    Rerooted { old_root: NodeId, new_root: NodeId },

    /// The old root has two children and neither can be collapsed. The
    /// tree was left untouched.
    Unsupported(NodeId),
}

impl RerootOutcome {
    /// The root of the tree after the call.
    pub fn root(&self) -> NodeId {
        match *self {
            Self::AlreadyRoot(root) | Self::Unsupported(root) => root,
            Self::Rerooted { new_root, .. } => new_root,
        }
    }

    /// True if the topology changed.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Rerooted { .. })
    }
}

/// Reroots the tree containing `candidate` so that `candidate` hangs
/// directly below a new root.
pub fn reroot_tree(state: &mut GraphState, candidate: NodeId) -> Result<RerootOutcome> {
    let old_root = state.root_of(candidate)?;
    state.tree_root(old_root)?;

    if candidate == old_root {
        state.tree_root_mut(old_root)?.rooting_is_set = true;
        return Ok(RerootOutcome::AlreadyRoot(old_root));
    }

    let root_children = state.children(old_root);
    if root_children.len() == 2 {
        let collapsible = root_children
            .iter()
            .copied()
            .find(|&child| child != candidate && !state.children(child).is_empty());
        match collapsible {
            Some(node) => collapse_into_parent(state, node, old_root)?,
            None => {
                warn!(
                    "cannot reroot at {}: root {} is bifurcating with no collapsible child",
                    candidate.index(),
                    old_root.index()
                );
                return Ok(RerootOutcome::Unsupported(old_root));
            }
        }
    }

    let within_ingroup = state.tree_data(old_root)?.within_ingroup;
    let new_root = state.create_node(GraphNode::Tree(TreeNodeData {
        within_ingroup,
        ..TreeNodeData::default()
    }));
    let parent = detach(state, candidate)?.ok_or_else(|| {
        GraphError::InvalidStructure(format!("node {} has no parent", candidate.index()))
    })?;
    attach(state, new_root, parent)?;
    attach(state, candidate, new_root)?;

    reverse_path(state, new_root)?;

    // the tree-level record moves with the root
    remove_tree_root_from_indexes(state, old_root);
    if let Some(edge) = state.single_edge(old_root, EdgeKind::MetadataFor, Direction::Incoming)? {
        state.retarget_edge(edge.id, edge.source, new_root)?;
    }
    let old_record = state.tree_data_mut(old_root)?.root.take();
    let new_record = state.tree_data_mut(new_root)?.root.take();
    state.tree_data_mut(old_root)?.root = new_record;
    state.tree_data_mut(new_root)?.root = old_record;
    state.tree_root_mut(new_root)?.rooting_is_set = true;
    add_tree_root_to_indexes(state, new_root)?;

    // a single-child root ends up as a leaf once its only edge is reversed
    if state.children(old_root).is_empty() {
        remove_stranded_root(state, old_root)?;
    }

    state.check_tree(new_root)?;
    info!(
        "Rerooted tree at node {} (root {} -> {})",
        candidate.index(),
        old_root.index(),
        new_root.index()
    );
    Ok(RerootOutcome::Rerooted { old_root, new_root })
}

/// Splices `node` out, moving its children up to `parent`. Each moved
/// child's branch absorbs the length of the removed branch.
fn collapse_into_parent(state: &mut GraphState, node: NodeId, parent: NodeId) -> Result<()> {
    let extra = state.tree_data(node)?.branch_length;
    for child in state.children(node) {
        detach(state, child)?;
        attach(state, child, parent)?;
        if let Some(extra) = extra {
            let data = state.tree_data_mut(child)?;
            data.branch_length = Some(data.branch_length.unwrap_or(0.0) + extra);
        }
    }
    for edge in state.edges_touching(node) {
        state.delete_edge(edge.id)?;
    }
    state.delete_node(node)?;
    debug!("collapsed node {} into {}", node.index(), parent.index());
    Ok(())
}

/// Deletes the former root when rerooting left it childless. It carries no
/// taxon, only the label of the degenerate edge above the old root.
fn remove_stranded_root(state: &mut GraphState, old_root: NodeId) -> Result<()> {
    for edge in state.edges_touching(old_root) {
        state.delete_edge(edge.id)?;
    }
    state.delete_node(old_root)?;
    debug!("removed stranded former root {}", old_root.index());
    Ok(())
}

/// Reverses the child-of edges from `start` up to the node flagged as the
/// root (or the last node with no parent), top down. Names and branch
/// lengths shift one step along the path so that each stays on the same
/// edge of the unrooted tree.
fn reverse_path(state: &mut GraphState, start: NodeId) -> Result<()> {
    let mut path = vec![start];
    let mut current = start;
    loop {
        if current != start && state.tree_data(current)?.is_root() {
            break;
        }
        let Some(parent) = state.parent(current)? else {
            break;
        };
        if path.len() > state.node_count() {
            return Err(GraphError::InvalidStructure(format!(
                "cycle above node {}",
                start.index()
            )));
        }
        path.push(parent);
        current = parent;
    }

    for i in (0..path.len() - 1).rev() {
        let (child, parent) = (path[i], path[i + 1]);
        swap_labels(state, child, parent)?;
        detach(state, child)?;
        attach(state, parent, child)?;
    }
    debug!("reversed {} edges", path.len() - 1);
    Ok(())
}

fn swap_labels(state: &mut GraphState, a: NodeId, b: NodeId) -> Result<()> {
    let (a_name, a_length) = {
        let data = state.tree_data_mut(a)?;
        (data.name.take(), data.branch_length.take())
    };
    let (b_name, b_length) = {
        let data = state.tree_data_mut(b)?;
        (
            std::mem::replace(&mut data.name, a_name),
            std::mem::replace(&mut data.branch_length, a_length),
        )
    };
    let data = state.tree_data_mut(a)?;
    data.name = b_name;
    data.branch_length = b_length;
    Ok(())
}

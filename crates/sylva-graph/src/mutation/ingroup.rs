//! Ingroup designation.

use crate::error::Result;
use crate::graph::{GraphState, NodeId};
use tracing::info;

/// Marks the subtree at `node` as the ingroup of its tree.
///
/// Any previous designation is cleared first, so repeated calls converge
/// on the same marked set. Returns the tree root.
pub fn designate_ingroup(state: &mut GraphState, node: NodeId) -> Result<NodeId> {
    let root = state.root_of(node)?;
    state.tree_root_mut(root)?.ingroup_is_set = true;

    if node != root {
        for member in state.tree_nodes(root) {
            state.tree_data_mut(member)?.within_ingroup = false;
        }
    }
    let subtree = state.tree_nodes(node);
    for member in &subtree {
        state.tree_data_mut(*member)?.within_ingroup = true;
    }

    info!(
        "Designated ingroup at node {} ({} nodes)",
        node.index(),
        subtree.len()
    );
    Ok(root)
}

/// Removes the ingroup designation from the tree containing `node`.
///
/// The root flag and every node flag are cleared together. Returns the
/// tree root.
pub fn clear_ingroup(state: &mut GraphState, node: NodeId) -> Result<NodeId> {
    let root = state.root_of(node)?;
    state.tree_root_mut(root)?.ingroup_is_set = false;
    for member in state.tree_nodes(root) {
        state.tree_data_mut(member)?.within_ingroup = false;
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteRegistry;
    use crate::mutation::add_source;
    use crate::node::Location;
    use sylva_core::{SourceDocument, Tree, TreeNode};

    // R -> (X -> (A, B), C)
    fn setup() -> (GraphState, Vec<NodeId>) {
        let mut state = GraphState::new();
        let tree = Tree::new(
            TreeNode::named("R")
                .with_child(
                    TreeNode::named("X")
                        .with_child(TreeNode::named("A"))
                        .with_child(TreeNode::named("B")),
                )
                .with_child(TreeNode::named("C")),
        );
        let doc = SourceDocument::new().with_tree(tree);
        let report = add_source(&mut state, &RemoteRegistry::default(), &doc, "s", Location::Local, false).unwrap();
        let root = report.trees[0].1;
        let nodes = state.tree_nodes(root);
        (state, nodes)
    }

    fn marked(state: &GraphState, nodes: &[NodeId]) -> Vec<NodeId> {
        nodes
            .iter()
            .copied()
            .filter(|n| state.tree_data(*n).unwrap().within_ingroup)
            .collect()
    }

    #[test]
    fn test_designate_is_idempotent() {
        // BFS order: R, X, C, A, B
        let (mut state, nodes) = setup();
        let x = nodes[1];
        designate_ingroup(&mut state, x).unwrap();
        let once = marked(&state, &nodes);
        designate_ingroup(&mut state, x).unwrap();
        assert_eq!(marked(&state, &nodes), once);
        assert_eq!(once, vec![nodes[1], nodes[3], nodes[4]]);
    }

    #[test]
    fn test_designate_elsewhere_clears_previous() {
        let (mut state, nodes) = setup();
        designate_ingroup(&mut state, nodes[1]).unwrap();
        let root = designate_ingroup(&mut state, nodes[2]).unwrap();
        assert_eq!(root, nodes[0]);
        assert_eq!(marked(&state, &nodes), vec![nodes[2]]);
    }

    #[test]
    fn test_designate_root_marks_everything() {
        let (mut state, nodes) = setup();
        designate_ingroup(&mut state, nodes[0]).unwrap();
        assert_eq!(marked(&state, &nodes), nodes);
        assert!(state.tree_root(nodes[0]).unwrap().ingroup_is_set);
    }

    #[test]
    fn test_clear_ingroup() {
        let (mut state, nodes) = setup();
        designate_ingroup(&mut state, nodes[1]).unwrap();
        clear_ingroup(&mut state, nodes[3]).unwrap();
        assert!(marked(&state, &nodes).is_empty());
        assert!(!state.tree_root(nodes[0]).unwrap().ingroup_is_set);
    }
}

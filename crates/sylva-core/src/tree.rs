//! Whole-tree values.

use crate::names::clean_name;
use crate::node::TreeNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute keys with a fixed meaning on tree values.
pub mod attrs {
    /// Incoming tree id, read from the root.
    pub const TREE_ID: &str = "id";
    /// Marks the node where the ingroup starts.
    pub const INGROUP_START: &str = "ingroup_start";
    /// Tip label before taxonomic mapping.
    pub const ORIGINAL_LABEL: &str = "ot:originalLabel";
    /// Numeric id of the mapped taxon.
    pub const OTT_ID: &str = "ot:ottId";
}

/// A rooted, ordered tree.
///
/// Serializes as its root node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree {
    pub root: TreeNode,
}

impl Tree {
    pub fn new(root: TreeNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// The incoming tree id, if the producer supplied one.
    pub fn id(&self) -> Option<String> {
        match self.root.attribute(attrs::TREE_ID)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn preorder(&self) -> impl Iterator<Item = &TreeNode> {
        self.root.preorder()
    }

    pub fn postorder(&self) -> Vec<&TreeNode> {
        self.root.postorder()
    }

    pub fn leaves(&self) -> Vec<&TreeNode> {
        self.root.leaves()
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().len()
    }

    /// Pre-order position of the first node flagged as the ingroup start.
    pub fn ingroup_start_position(&self) -> Option<usize> {
        self.preorder()
            .position(|node| node.has_flag(attrs::INGROUP_START))
    }

    /// Writes the tree as a Newick string, terminated by `;`.
    pub fn to_newick(&self, branch_lengths: bool) -> String {
        let mut out = String::new();
        write_newick(&self.root, branch_lengths, &mut out);
        out.push(';');
        out
    }
}

impl From<TreeNode> for Tree {
    fn from(root: TreeNode) -> Self {
        Self::new(root)
    }
}

fn write_newick(node: &TreeNode, branch_lengths: bool, out: &mut String) {
    if !node.children.is_empty() {
        out.push('(');
        for (i, child) in node.children.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_newick(child, branch_lengths, out);
            if branch_lengths {
                out.push(':');
                out.push_str(&child.branch_length().to_string());
            }
        }
        out.push(')');
    }
    if let Some(name) = &node.name {
        out.push_str(&clean_name(name));
    }
}

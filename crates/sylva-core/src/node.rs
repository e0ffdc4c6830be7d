//! Tree value nodes.
//!
//! A [`TreeNode`] exclusively owns its children, so a value is always
//! tree-shaped. Nodes are built by parsers (or by hand in tests) and handed
//! to the graph engine, which copies them into the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Branch length reported in place of an exact zero.
///
/// Zero-length edges produce degenerate output in derived formats, so the
/// accessor never returns `0.0`.
pub const MIN_BRANCH_LENGTH: f64 = 1e-22;

fn default_branch_length() -> f64 {
    MIN_BRANCH_LENGTH
}

/// A node in an in-memory tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Display name (the mapped taxon name for tips).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default = "default_branch_length")]
    branch_length: f64,

    /// Open attribute bag carried through from the parser.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Value>,

    /// Ordered children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl Default for TreeNode {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeNode {
    /// Creates an unnamed node with no children.
    pub fn new() -> Self {
        Self {
            name: None,
            branch_length: MIN_BRANCH_LENGTH,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Creates a node with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new()
        }
    }

    /// Appends a child, builder style.
    pub fn with_child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    /// Appends several children, builder style.
    pub fn with_children(mut self, children: impl IntoIterator<Item = TreeNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Sets an attribute, builder style.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Sets the branch length, builder style.
    pub fn with_branch_length(mut self, length: f64) -> Self {
        self.set_branch_length(length);
        self
    }

    /// Length of the edge to this node's parent. Never exactly zero.
    pub fn branch_length(&self) -> f64 {
        if self.branch_length == 0.0 {
            MIN_BRANCH_LENGTH
        } else {
            self.branch_length
        }
    }

    pub fn set_branch_length(&mut self, length: f64) {
        self.branch_length = if length == 0.0 {
            MIN_BRANCH_LENGTH
        } else {
            length
        };
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns true if the attribute is present and truthy (`true`, a
    /// non-zero number, or any string other than `"false"` / `""`).
    pub fn has_flag(&self, key: &str) -> bool {
        match self.attributes.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
            Some(Value::String(s)) => !s.is_empty() && s != "false",
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }

    /// Iterates this node and all its descendants in pre-order
    /// (a node before its children, children left to right).
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder { stack: vec![self] }
    }

    /// Returns this node and all its descendants in post-order
    /// (children left to right before the node itself).
    pub fn postorder(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        collect_postorder(self, &mut out);
        out
    }

    /// Returns the leaves below (or at) this node, in pre-order.
    pub fn leaves(&self) -> Vec<&TreeNode> {
        self.preorder().filter(|n| n.is_leaf()).collect()
    }

    /// Number of nodes in the subtree rooted here, including this one.
    pub fn node_count(&self) -> usize {
        self.preorder().count()
    }
}

fn collect_postorder<'a>(node: &'a TreeNode, out: &mut Vec<&'a TreeNode>) {
    for child in &node.children {
        collect_postorder(child, out);
    }
    out.push(node);
}

/// Pre-order iterator over a [`TreeNode`] subtree.
pub struct Preorder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

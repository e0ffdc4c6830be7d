//! Sylva Core - phylogenetic tree values
//!
//! This crate holds the caller-owned, in-memory side of Sylva: ordered,
//! named trees with branch lengths and an open attribute bag per node,
//! and the source documents that bundle a study's trees with its
//! curation properties.
//!
//! Nothing here touches the graph store. Parsers produce these values and
//! the `sylva-graph` engine consumes them.
//!
//! # Example
//!
//! ```
//! use sylva_core::{Tree, TreeNode};
//!
//! let tree = Tree::new(
//!     TreeNode::named("root")
//!         .with_child(TreeNode::named("Homo sapiens"))
//!         .with_child(TreeNode::named("Pan troglodytes")),
//! );
//!
//! assert_eq!(tree.leaf_count(), 2);
//! assert_eq!(tree.to_newick(false), "(Homo_sapiens,Pan_troglodytes)root;");
//! ```

mod error;
mod names;
mod node;
mod source;
mod tree;

pub use error::{CoreError, Result};
pub use names::{clean_name, fold_whitespace, WHITESPACE_SUBSTITUTE};
pub use node::{Preorder, TreeNode, MIN_BRANCH_LENGTH};
pub use source::SourceDocument;
pub use tree::{attrs, Tree};

//! Sylva Graph - graph-backed tree storage
//!
//! This crate stores phylogenetic trees and their source studies in one
//! shared graph, and keeps a set of secondary indexes consistent with the
//! node content under import, rerooting, ingroup designation, editing and
//! deletion.
//!
//! # Architecture
//!
//! - A petgraph arena with stable node ids holds tree nodes and source
//!   metadata nodes. Trees are parent-pointer arborescences (`ChildOf`
//!   edges point from child to parent).
//! - Every mutation runs inside a [`Transaction`] that rolls back on drop
//!   unless committed, and is persisted to sled on commit.
//! - The index registry ([`SEARCHABLE_PROPERTIES`]) declares which
//!   property lands in which index.
//!
//! # Example
//!
//! ```
//! use sylva_core::{SourceDocument, Tree, TreeNode};
//! use sylva_graph::{Location, StoreConfig, TaxonField, TreeEngine};
//!
//! let mut engine = TreeEngine::in_memory(StoreConfig::default()).unwrap();
//! let doc = SourceDocument::new().with_tree(Tree::new(
//!     TreeNode::named("root")
//!         .with_child(TreeNode::named("Homo sapiens"))
//!         .with_child(TreeNode::named("Pan troglodytes")),
//! ));
//!
//! let report = engine.add_source(&doc, "pg_1", Location::Local, false).unwrap();
//! let root = report.trees[0].1;
//!
//! let hits = engine.browser().trees_with_taxon(TaxonField::Mapped, "Pan troglodytes");
//! assert_eq!(hits, vec![root]);
//! ```

mod browse;
mod config;
mod edge;
mod engine;
mod error;
mod graph;
mod index;
pub mod mutation;
mod node;
mod property;
mod registry;
mod search_index;
mod store;
mod transaction;

pub use browse::{
    Browser, Metadata, TaxonField, BREADCRUMB_ATTR, CHILD_COUNT_ATTR, INCOMPLETE_ATTR, INGROUP_ATTR,
    NODE_ID_ATTR, TREE_IDS_KEY,
};
pub use config::{RemoteRegistry, StoreConfig, CONFIG_DIR, CONFIG_FILE};
pub use edge::{Edge, EdgeKind};
pub use engine::TreeEngine;
pub use error::{GraphError, Result};
pub use graph::{EdgeId, EdgeInfo, GraphState, GraphStats, NodeId};
pub use index::{IndexKind, IndexName, IndexSet, NodeClass, SecondaryIndex};
pub use mutation::{ImportReport, PropertyChanges, RerootOutcome};
pub use node::{GraphNode, Location, SourceMeta, TipTaxa, TreeNodeData, TreeRoot};
pub use property::{
    keys, PropertyValue, EDITABLE_SOURCE_PROPERTIES, EDITABLE_TREE_PROPERTIES, VISIBLE_OTU_PROPERTIES,
    VISIBLE_SOURCE_PROPERTIES, VISIBLE_TREE_PROPERTIES,
};
pub use registry::{
    index_consistency, validate_properties, validate_registry, SearchableProperty, ValueKind,
    SEARCHABLE_PROPERTIES,
};
pub use search_index::SearchIndex;
pub use store::{GraphStore, StoreError};
pub use transaction::{GraphDb, Transaction};

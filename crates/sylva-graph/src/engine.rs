//! The tree engine: one transaction per mutation.

use crate::browse::Browser;
use crate::config::{RemoteRegistry, StoreConfig};
use crate::edge::EdgeKind;
use crate::error::{GraphError, Result};
use crate::graph::{GraphState, GraphStats, NodeId};
use crate::mutation::{self, ImportReport, PropertyChanges, RerootOutcome};
use crate::node::{GraphNode, Location};
use crate::registry::{index_consistency, validate_registry};
use crate::transaction::GraphDb;
use petgraph::Direction;
use std::path::Path;
use sylva_core::{SourceDocument, Tree};
use tracing::info;

/// Owns the graph database and runs every mutation inside its own
/// transaction. Reads go through [`TreeEngine::browser`].
pub struct TreeEngine {
    db: GraphDb,
    config: StoreConfig,
}

impl TreeEngine {
    /// Opens a sled-backed engine at `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: StoreConfig) -> Result<Self> {
        validate_registry()?;
        Ok(Self {
            db: GraphDb::open(path)?,
            config,
        })
    }

    /// An engine that keeps everything in memory.
    pub fn in_memory(config: StoreConfig) -> Result<Self> {
        validate_registry()?;
        Ok(Self {
            db: GraphDb::in_memory(),
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Replaces the known-remotes snapshot.
    pub fn set_remotes(&mut self, remotes: RemoteRegistry) {
        self.config.known_remotes = remotes;
    }

    pub fn state(&self) -> &GraphState {
        self.db.state()
    }

    pub fn browser(&self) -> Browser<'_> {
        Browser::new(self.db.state(), &self.config)
    }

    pub fn stats(&self) -> GraphStats {
        self.db.state().stats()
    }

    pub fn add_source(
        &mut self,
        doc: &SourceDocument,
        source_id: &str,
        location: Location,
        overwrite: bool,
    ) -> Result<ImportReport> {
        let remotes = self.config.known_remotes.clone();
        let mut tx = self.db.begin();
        let report = mutation::add_source(&mut tx, &remotes, doc, source_id, location, overwrite)?;
        tx.commit()?;
        Ok(report)
    }

    pub fn add_tree(&mut self, tree: &Tree, tree_id: &str, source: NodeId) -> Result<NodeId> {
        let mut tx = self.db.begin();
        let root = mutation::add_tree(&mut tx, tree, tree_id, source)?;
        tx.commit()?;
        Ok(root)
    }

    pub fn designate_ingroup(&mut self, node: NodeId) -> Result<NodeId> {
        let mut tx = self.db.begin();
        let root = mutation::designate_ingroup(&mut tx, node)?;
        tx.commit()?;
        Ok(root)
    }

    pub fn clear_ingroup(&mut self, node: NodeId) -> Result<NodeId> {
        let mut tx = self.db.begin();
        let root = mutation::clear_ingroup(&mut tx, node)?;
        tx.commit()?;
        Ok(root)
    }

    /// Reroots the tree containing `node`. An unsupported reroot changes
    /// nothing and is not an error; check the outcome.
    pub fn reroot_tree(&mut self, node: NodeId) -> Result<RerootOutcome> {
        let mut tx = self.db.begin();
        let outcome = mutation::reroot_tree(&mut tx, node)?;
        match outcome {
            RerootOutcome::Unsupported(_) => tx.rollback(),
            _ => tx.commit()?,
        }
        Ok(outcome)
    }

    pub fn delete_tree(&mut self, root: NodeId) -> Result<usize> {
        let mut tx = self.db.begin();
        let removed = mutation::delete_tree(&mut tx, root)?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn delete_source(&mut self, source: NodeId) -> Result<usize> {
        let mut tx = self.db.begin();
        let removed = mutation::delete_source(&mut tx, source)?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn update_source_properties(&mut self, source: NodeId, changes: &PropertyChanges) -> Result<()> {
        let mut tx = self.db.begin();
        mutation::update_source_properties(&mut tx, source, changes)?;
        tx.commit()
    }

    pub fn update_tree_properties(&mut self, root: NodeId, changes: &PropertyChanges) -> Result<()> {
        let mut tx = self.db.begin();
        mutation::update_tree_properties(&mut tx, root, changes)?;
        tx.commit()
    }

    /// Checks every invariant over the whole graph: tree shape, ingroup
    /// flags, copy links, index consistency and identity uniqueness.
    pub fn verify(&self) -> Result<()> {
        let state = self.db.state();
        for node in state.node_ids() {
            match state.node(node)? {
                GraphNode::Tree(data) => {
                    if let Some(root) = data.root.as_deref() {
                        state.check_tree(node)?;
                        if !root.ingroup_is_set {
                            let flagged = state
                                .tree_nodes(node)
                                .into_iter()
                                .filter(|n| state.tree_data(*n).map_or(false, |d| d.within_ingroup))
                                .count();
                            if flagged > 0 {
                                return Err(GraphError::Corruption(format!(
                                    "tree {} has {} ingroup nodes but no ingroup set",
                                    root.tree_id, flagged
                                )));
                            }
                        }
                        self.browser().require_tree(&root.tree_id, &root.location)?;
                    } else if state.parent(node)?.is_none() {
                        return Err(GraphError::InvalidStructure(format!(
                            "node {} is detached from any tree",
                            node.index()
                        )));
                    }
                }
                GraphNode::Source(meta) => {
                    self.browser().require_source(&meta.source_id, &meta.location)?;
                    if meta.location.is_local() {
                        let links = state.edges_of(node, Some(EdgeKind::IsLocalCopyOf), Direction::Outgoing);
                        if links.len() > 1 {
                            return Err(GraphError::Corruption(format!(
                                "local source {} is a copy of {} remote sources",
                                meta.source_id,
                                links.len()
                            )));
                        }
                    }
                }
            }
            index_consistency(state, node)?;
        }
        info!("Verified {} nodes", state.node_count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sylva_core::TreeNode;
    use tempfile::tempdir;

    fn doc() -> SourceDocument {
        SourceDocument::new().with_tree(Tree::new(
            TreeNode::named("R")
                .with_child(TreeNode::named("A"))
                .with_child(
                    TreeNode::named("X")
                        .with_child(TreeNode::named("B"))
                        .with_child(TreeNode::named("C")),
                ),
        ))
    }

    #[test]
    fn test_failed_import_rolls_back() {
        let mut engine = TreeEngine::in_memory(StoreConfig::default()).unwrap();
        // two trees that map to the same tree id
        let tree = Tree::new(TreeNode::named("R").with_attribute("id", "same"));
        let clash = SourceDocument::new().with_tree(tree.clone()).with_tree(tree);

        let result = engine.add_source(&clash, "s", Location::Local, false);
        assert!(matches!(result, Err(GraphError::UnsupportedOperation(_))));
        assert_eq!(engine.stats().node_count, 0);
        assert!(engine.browser().source_ids(&Location::Local, &[]).is_empty());
    }

    #[test]
    fn test_unsupported_reroot_is_not_committed() {
        let mut engine = TreeEngine::in_memory(StoreConfig::default()).unwrap();
        let report = engine.add_source(&doc(), "s", Location::Local, false).unwrap();
        let root = report.trees[0].1;
        let x = engine.state().children(root)[1];

        let outcome = engine.reroot_tree(x).unwrap();
        assert_eq!(outcome.root(), root);
        assert!(!outcome.changed());
        engine.verify().unwrap();
    }

    #[test]
    fn test_verify_rejects_second_copy_link() {
        let mut engine = TreeEngine::in_memory(StoreConfig::default()).unwrap();
        let local = engine.add_source(&doc(), "s", Location::Local, false).unwrap().source;
        let remote = engine.add_source(&doc(), "s", Location::remote("remote"), false).unwrap().source;
        assert_eq!(
            engine.state().edges_of(local, Some(EdgeKind::IsLocalCopyOf), Direction::Outgoing).len(),
            1
        );
        engine.verify().unwrap();

        let mut tx = engine.db.begin();
        tx.create_edge(local, remote, EdgeKind::IsLocalCopyOf).unwrap();
        tx.commit().unwrap();
        assert!(matches!(engine.verify(), Err(GraphError::Corruption(_))));
    }

    #[test]
    fn test_set_remotes_enables_import() {
        let mut engine = TreeEngine::in_memory(StoreConfig::default()).unwrap();
        let location = Location::remote("treebase");
        assert!(engine.add_source(&doc(), "s", location.clone(), false).is_err());

        let remotes = engine.config().known_remotes.with_remote("treebase");
        engine.set_remotes(remotes);
        engine.add_source(&doc(), "s", location, false).unwrap();
        engine.verify().unwrap();
    }

    #[test]
    fn test_persistent_engine_reloads() {
        let dir = tempdir().unwrap();
        let root = {
            let mut engine = TreeEngine::open(dir.path(), StoreConfig::default()).unwrap();
            let report = engine.add_source(&doc(), "s", Location::Local, false).unwrap();
            let b = engine.state().tree_nodes(report.trees[0].1)[3];
            engine.designate_ingroup(b).unwrap()
        };
        let engine = TreeEngine::open(dir.path(), StoreConfig::default()).unwrap();
        let browser = engine.browser();
        assert_eq!(browser.require_tree("s___local_id_0", &Location::Local).unwrap(), root);
        assert!(engine.state().tree_root(root).unwrap().ingroup_is_set);
        engine.verify().unwrap();
    }
}

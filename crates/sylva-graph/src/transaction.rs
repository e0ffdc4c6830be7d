//! Scoped transactions over the graph.
//!
//! A [`Transaction`] snapshots the state when it begins. Committing
//! persists the state (when a store is attached) and discards the
//! snapshot; dropping an uncommitted transaction puts the snapshot back,
//! so an early `?` return never leaves a half-applied mutation behind.

use crate::error::Result;
use crate::graph::GraphState;
use crate::store::GraphStore;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use tracing::{debug, info, warn};

/// The graph state together with its optional persistent store.
pub struct GraphDb {
    state: GraphState,
    store: Option<GraphStore>,
}

impl GraphDb {
    /// A database that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            state: GraphState::new(),
            store: None,
        }
    }

    /// Opens (or creates) a sled-backed database and loads its graph.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = GraphStore::open(path.as_ref())?;
        let state = match store.load_state()? {
            Some(state) => {
                info!(
                    "Loaded graph from {} ({} nodes, {} edges)",
                    path.as_ref().display(),
                    state.node_count(),
                    state.edge_count()
                );
                state
            }
            None => GraphState::new(),
        };
        Ok(Self {
            state,
            store: Some(store),
        })
    }

    /// Committed state, for read-only queries.
    pub fn state(&self) -> &GraphState {
        &self.state
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn begin(&mut self) -> Transaction<'_> {
        let snapshot = self.state.clone();
        Transaction {
            db: self,
            snapshot: Some(snapshot),
        }
    }
}

/// Write access to the graph, rolled back unless committed.
pub struct Transaction<'a> {
    db: &'a mut GraphDb,
    snapshot: Option<GraphState>,
}

impl Transaction<'_> {
    pub fn commit(mut self) -> Result<()> {
        if let Some(store) = &self.db.store {
            store.save_state(&self.db.state)?;
        }
        self.snapshot = None;
        debug!("transaction committed");
        Ok(())
    }

    /// Discards every change made in this transaction.
    pub fn rollback(mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.db.state = snapshot;
            debug!("transaction rolled back");
        }
    }
}

impl Deref for Transaction<'_> {
    type Target = GraphState;

    fn deref(&self) -> &GraphState {
        &self.db.state
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut GraphState {
        &mut self.db.state
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            warn!("transaction dropped without commit, rolling back");
            self.db.state = snapshot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{GraphNode, TreeNodeData};
    use tempfile::tempdir;

    fn node() -> GraphNode {
        GraphNode::Tree(TreeNodeData::default())
    }

    #[test]
    fn test_commit_keeps_changes() {
        let mut db = GraphDb::in_memory();
        let mut tx = db.begin();
        tx.create_node(node());
        tx.commit().unwrap();
        assert_eq!(db.state().node_count(), 1);
    }

    #[test]
    fn test_drop_rolls_back() {
        let mut db = GraphDb::in_memory();
        {
            let mut tx = db.begin();
            tx.create_node(node());
        }
        assert_eq!(db.state().node_count(), 0);

        let mut tx = db.begin();
        tx.create_node(node());
        tx.rollback();
        assert_eq!(db.state().node_count(), 0);
    }

    #[test]
    fn test_error_path_rolls_back() {
        fn failing(db: &mut GraphDb) -> Result<()> {
            let mut tx = db.begin();
            tx.create_node(node());
            let a = tx.create_node(node());
            tx.delete_node(a)?;
            tx.delete_node(a)?;
            tx.commit()
        }
        let mut db = GraphDb::in_memory();
        assert!(failing(&mut db).is_err());
        assert_eq!(db.state().node_count(), 0);
    }

    #[test]
    fn test_persistent_commit() {
        let dir = tempdir().unwrap();
        {
            let mut db = GraphDb::open(dir.path()).unwrap();
            assert!(db.is_persistent());
            let mut tx = db.begin();
            tx.create_node(node());
            tx.create_node(node());
            tx.commit().unwrap();
        }
        let db = GraphDb::open(dir.path()).unwrap();
        assert_eq!(db.state().node_count(), 2);
    }
}

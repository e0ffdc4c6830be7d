//! Tree and source mutations.
//!
//! Every function here works on a `&mut GraphState` and leaves transaction
//! handling to the caller: `TreeEngine` wraps each call in one transaction,
//! so an error anywhere rolls back all of its writes.

mod delete;
mod edit;
mod import;
mod ingroup;
mod reroot;

pub use delete::{delete_source, delete_tree};
pub use edit::{update_source_properties, update_tree_properties, PropertyChanges};
pub use import::{add_source, add_tree, ImportReport};
pub use ingroup::{clear_ingroup, designate_ingroup};
pub use reroot::{reroot_tree, RerootOutcome};

use crate::edge::EdgeKind;
use crate::error::Result;
use crate::graph::{GraphState, NodeId};
use petgraph::Direction;

/// Removes the child-of edge of `node`, returning its former parent.
pub(crate) fn detach(state: &mut GraphState, node: NodeId) -> Result<Option<NodeId>> {
    match state.single_edge(node, EdgeKind::ChildOf, Direction::Outgoing)? {
        Some(edge) => {
            state.delete_edge(edge.id)?;
            Ok(Some(edge.target))
        }
        None => Ok(None),
    }
}

pub(crate) fn attach(state: &mut GraphState, child: NodeId, parent: NodeId) -> Result<()> {
    state.create_edge(child, parent, EdgeKind::ChildOf)?;
    Ok(())
}

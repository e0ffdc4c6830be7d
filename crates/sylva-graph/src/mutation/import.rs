//! Importing sources and trees.

use super::delete::delete_source;
use super::ingroup::designate_ingroup;
use crate::config::RemoteRegistry;
use crate::edge::EdgeKind;
use crate::error::{GraphError, Result};
use crate::graph::{GraphState, NodeId};
use crate::index::IndexName;
use crate::node::{GraphNode, Location, SourceMeta, TipTaxa, TreeNodeData, TreeRoot};
use crate::property::{keys, PropertyValue};
use crate::registry::{add_source_meta_to_indexes, add_tree_root_to_indexes};
use petgraph::Direction;
use serde_json::Value;
use sylva_core::{attrs, fold_whitespace, SourceDocument, Tree, TreeNode};
use tracing::{debug, info, warn};

/// What an import produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub source: NodeId,
    /// `(tree id, root)` for every imported tree, in input order.
    pub trees: Vec<(String, NodeId)>,
    /// Positions of null trees that were skipped.
    pub skipped: Vec<usize>,
}

/// Imports a source document and all of its trees.
///
/// An existing source with the same id in the same location is rejected
/// unless `overwrite` is set, in which case it is deleted first together
/// with its trees.
pub fn add_source(
    state: &mut GraphState,
    remotes: &RemoteRegistry,
    doc: &SourceDocument,
    source_id: &str,
    location: Location,
    overwrite: bool,
) -> Result<ImportReport> {
    if !remotes.accepts(&location) {
        return Err(GraphError::UnsupportedOperation(format!(
            "unknown remote '{}'",
            location
        )));
    }

    let existing = state.indexes().query_unique(
        IndexName::SourceMetaBySourceId,
        &location.source_id_key(),
        source_id,
    )?;
    if let Some(existing) = existing {
        if !overwrite {
            return Err(GraphError::UnsupportedOperation(format!(
                "source '{}' already exists in {}",
                source_id, location
            )));
        }
        info!("Overwriting source {} in {}", source_id, location);
        delete_source(state, existing)?;
    }

    let mut meta = SourceMeta::new(source_id, location.clone());
    for (key, value) in &doc.properties {
        if key == keys::SOURCE_ID || key == keys::LOCATION {
            debug!("ignoring reserved source property {}", key);
            continue;
        }
        match PropertyValue::from_json(value) {
            Some(converted) => {
                meta.properties.insert(key.clone(), converted);
            }
            None => warn!("source {}: property {} has no flat value, dropped", source_id, key),
        }
    }
    let source = state.create_node(GraphNode::Source(meta));
    add_source_meta_to_indexes(state, source)?;
    link_copies(state, remotes, source, source_id, &location)?;

    let mut report = ImportReport {
        source,
        trees: Vec::new(),
        skipped: Vec::new(),
    };
    for (position, tree) in doc.trees.iter().enumerate() {
        let Some(tree) = tree else {
            warn!("source {}: tree {} is null, skipped", source_id, position);
            report.skipped.push(position);
            continue;
        };
        let local_id = tree
            .id()
            .unwrap_or_else(|| format!("__local_id_{}", position));
        let tree_id = format!("{}_{}", source_id, local_id);
        let root = add_tree(state, tree, &tree_id, source)?;
        report.trees.push((tree_id, root));
    }

    info!(
        "Imported source {} into {} ({} trees, {} skipped)",
        source_id,
        location,
        report.trees.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Links a new source to its counterpart in the other location(s).
fn link_copies(
    state: &mut GraphState,
    remotes: &RemoteRegistry,
    source: NodeId,
    source_id: &str,
    location: &Location,
) -> Result<()> {
    match location {
        Location::Local => {
            for remote in remotes.locations() {
                let found = state.indexes().query_unique(
                    IndexName::SourceMetaBySourceId,
                    &remote.source_id_key(),
                    source_id,
                )?;
                if let Some(remote_source) = found {
                    state.create_edge(source, remote_source, EdgeKind::IsLocalCopyOf)?;
                    debug!("linked local {} to {}", source_id, remote);
                    break;
                }
            }
        }
        Location::Remote(_) => {
            let local = state.indexes().query_unique(
                IndexName::SourceMetaBySourceId,
                &Location::Local.source_id_key(),
                source_id,
            )?;
            if let Some(local) = local {
                let linked = !state
                    .edges_of(local, Some(EdgeKind::IsLocalCopyOf), Direction::Outgoing)
                    .is_empty();
                if !linked {
                    state.create_edge(local, source, EdgeKind::IsLocalCopyOf)?;
                    debug!("linked local {} to {}", source_id, location);
                }
            }
        }
    }
    Ok(())
}

/// Adds one tree under `source` and returns its root.
///
/// Local trees are copied node by node; remote trees get a single
/// placeholder root that carries the tree-level fields and index entries.
pub fn add_tree(state: &mut GraphState, tree: &Tree, tree_id: &str, source: NodeId) -> Result<NodeId> {
    let (source_id, location) = {
        let meta = state.source_meta(source)?;
        (meta.source_id.clone(), meta.location.clone())
    };
    let taken = state
        .indexes()
        .query_unique(IndexName::TreeRootsByTreeId, &location.tree_id_key(), tree_id)?;
    if taken.is_some() {
        return Err(GraphError::UnsupportedOperation(format!(
            "tree '{}' already exists in {}",
            tree_id, location
        )));
    }

    let created = if location.is_local() {
        replicate(state, tree)?
    } else {
        vec![state.create_node(GraphNode::Tree(node_data(tree.root())))]
    };
    let root = created[0];
    state.create_edge(source, root, EdgeKind::MetadataFor)?;

    let mut record = TreeRoot::new(tree_id, source_id, location);
    record.tip_taxa = tip_taxa(tree);
    for (key, value) in &tree.root().attributes {
        if matches!(
            key.as_str(),
            attrs::TREE_ID | attrs::INGROUP_START | attrs::ORIGINAL_LABEL | attrs::OTT_ID
        ) {
            continue;
        }
        match PropertyValue::from_json(value) {
            Some(converted) => {
                record.attributes.insert(key.clone(), converted);
            }
            None => debug!("tree {}: attribute {} has no flat value, dropped", tree_id, key),
        }
    }
    state.tree_data_mut(root)?.root = Some(Box::new(record));

    add_tree_root_to_indexes(state, root)?;
    state.check_tree(root)?;

    if let Some(position) = tree.ingroup_start_position() {
        match created.get(position) {
            Some(&start) => {
                designate_ingroup(state, start)?;
            }
            None => debug!("tree {}: ingroup start is not materialized", tree_id),
        }
    }

    debug!("added tree {} ({} nodes)", tree_id, created.len());
    Ok(root)
}

/// Copies the tree into the graph in pre-order. The returned ids are in
/// the same order as `Tree::preorder`.
fn replicate(state: &mut GraphState, tree: &Tree) -> Result<Vec<NodeId>> {
    let mut created = Vec::with_capacity(tree.node_count());
    let mut stack: Vec<(&TreeNode, Option<NodeId>)> = vec![(tree.root(), None)];
    while let Some((value, parent)) = stack.pop() {
        let id = state.create_node(GraphNode::Tree(node_data(value)));
        if let Some(parent) = parent {
            state.create_edge(id, parent, EdgeKind::ChildOf)?;
        }
        created.push(id);
        for child in value.children.iter().rev() {
            stack.push((child, Some(id)));
        }
    }
    Ok(created)
}

fn node_data(value: &TreeNode) -> TreeNodeData {
    TreeNodeData {
        name: value.name.clone(),
        original_label: text_attribute(value, attrs::ORIGINAL_LABEL),
        branch_length: Some(value.branch_length()),
        ott_id: ott_id(value),
        within_ingroup: false,
        root: None,
    }
}

fn text_attribute(value: &TreeNode, key: &str) -> Option<String> {
    match value.attribute(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn ott_id(value: &TreeNode) -> Option<i64> {
    match value.attribute(attrs::OTT_ID)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn tip_taxa(tree: &Tree) -> TipTaxa {
    let mut taxa = TipTaxa::default();
    for leaf in tree.leaves() {
        if let Some(original) = text_attribute(leaf, attrs::ORIGINAL_LABEL).or_else(|| leaf.name.clone()) {
            taxa.original_names.push(original);
        }
        if let Some(name) = &leaf.name {
            taxa.mapped_names.push(name.clone());
            taxa.mapped_names_folded.push(fold_whitespace(name));
        }
        if let Some(id) = ott_id(leaf) {
            taxa.mapped_ott_ids.push(id);
        }
    }
    taxa
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn primates() -> Tree {
        Tree::new(
            TreeNode::named("root")
                .with_attribute(attrs::TREE_ID, "tree1")
                .with_attribute(keys::TAG, "mito")
                .with_child(
                    TreeNode::new()
                        .with_child(
                            TreeNode::named("Homo sapiens")
                                .with_attribute(attrs::ORIGINAL_LABEL, "H. sapiens")
                                .with_attribute(attrs::OTT_ID, 770315),
                        )
                        .with_child(TreeNode::named("Pan troglodytes").with_attribute(attrs::OTT_ID, 417950)),
                )
                .with_child(TreeNode::named("Gorilla")),
        )
    }

    fn import(state: &mut GraphState, doc: &SourceDocument, id: &str, location: Location) -> Result<ImportReport> {
        add_source(state, &RemoteRegistry::default(), doc, id, location, false)
    }

    #[test]
    fn test_local_import_replicates_tree() {
        let mut state = GraphState::new();
        let doc = SourceDocument::new()
            .with_property(keys::CURATOR_NAME, "Jane")
            .with_tree(primates());
        let report = import(&mut state, &doc, "pg_1", Location::Local).unwrap();

        assert_eq!(report.trees.len(), 1);
        let (tree_id, root) = &report.trees[0];
        assert_eq!(tree_id, "pg_1_tree1");
        assert_eq!(state.tree_nodes(*root).len(), 5);

        let record = state.tree_root(*root).unwrap();
        assert_eq!(record.source_id, "pg_1");
        assert_eq!(record.tip_taxa.original_names, vec!["H. sapiens", "Pan troglodytes", "Gorilla"]);
        assert_eq!(record.tip_taxa.mapped_names_folded[0], "Homo%s%sapiens");
        assert_eq!(record.tip_taxa.mapped_ott_ids, vec![770315, 417950]);
        assert_eq!(record.attributes.get(keys::TAG), Some(&PropertyValue::from("mito")));
        assert!(!record.attributes.contains_key(attrs::TREE_ID));

        let source = state.source_meta(report.source).unwrap();
        assert_eq!(source.properties.get(keys::CURATOR_NAME), Some(&PropertyValue::from("Jane")));
    }

    #[test]
    fn test_remote_import_is_placeholder_only() {
        let mut state = GraphState::new();
        let doc = SourceDocument::new().with_tree(primates());
        let report = import(&mut state, &doc, "pg_1", Location::remote("remote")).unwrap();
        let root = report.trees[0].1;
        assert_eq!(state.tree_nodes(root), vec![root]);
        assert_eq!(
            state
                .indexes()
                .query_multiple(IndexName::TreeRootsByMappedTaxonName, "name", "Gorilla"),
            vec![root]
        );
    }

    #[test]
    fn test_duplicate_source_rejected_without_overwrite() {
        let mut state = GraphState::new();
        let doc = SourceDocument::new().with_tree(primates());
        import(&mut state, &doc, "pg_1", Location::Local).unwrap();
        assert!(matches!(
            import(&mut state, &doc, "pg_1", Location::Local),
            Err(GraphError::UnsupportedOperation(_))
        ));

        let nodes_before = state.node_count();
        add_source(&mut state, &RemoteRegistry::default(), &doc, "pg_1", Location::Local, true).unwrap();
        assert_eq!(state.node_count(), nodes_before);
    }

    #[test]
    fn test_unknown_remote_rejected() {
        let mut state = GraphState::new();
        let doc = SourceDocument::new();
        assert!(matches!(
            import(&mut state, &doc, "pg_1", Location::remote("dryad")),
            Err(GraphError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_null_trees_skipped_and_ids_positional() {
        let mut state = GraphState::new();
        let unnamed = Tree::new(TreeNode::named("R").with_child(TreeNode::named("A")));
        let doc = SourceDocument::new()
            .with_missing_tree()
            .with_tree(unnamed);
        let report = import(&mut state, &doc, "pg_2", Location::Local).unwrap();
        assert_eq!(report.skipped, vec![0]);
        assert_eq!(report.trees[0].0, "pg_2___local_id_1");
    }

    #[test]
    fn test_copy_links() {
        let mut state = GraphState::new();
        let doc = SourceDocument::new();
        let remote = import(&mut state, &doc, "pg_3", Location::remote("remote")).unwrap().source;
        let local = import(&mut state, &doc, "pg_3", Location::Local).unwrap().source;
        let links = state.edges_of(local, Some(EdgeKind::IsLocalCopyOf), Direction::Outgoing);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, remote);
    }

    #[test]
    fn test_ingroup_start_applied() {
        let mut state = GraphState::new();
        let tree = Tree::new(
            TreeNode::named("R")
                .with_child(TreeNode::named("out"))
                .with_child(
                    TreeNode::named("in")
                        .with_attribute(attrs::INGROUP_START, json!(true))
                        .with_child(TreeNode::named("A"))
                        .with_child(TreeNode::named("B")),
                ),
        );
        let doc = SourceDocument::new().with_tree(tree);
        let report = import(&mut state, &doc, "pg_4", Location::Local).unwrap();
        let root = report.trees[0].1;

        assert!(state.tree_root(root).unwrap().ingroup_is_set);
        let marked: Vec<_> = state
            .tree_nodes(root)
            .into_iter()
            .filter(|n| state.tree_data(*n).unwrap().within_ingroup)
            .filter_map(|n| state.tree_data(n).unwrap().name.clone())
            .collect();
        assert_eq!(marked, vec!["in", "A", "B"]);
    }
}

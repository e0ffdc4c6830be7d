//! Editing curation properties.

use crate::error::{GraphError, Result};
use crate::graph::{GraphState, NodeId};
use crate::property::{PropertyValue, EDITABLE_SOURCE_PROPERTIES, EDITABLE_TREE_PROPERTIES};
use crate::registry::{
    add_source_meta_to_indexes, add_tree_root_to_indexes, remove_source_meta_from_indexes,
    remove_tree_root_from_indexes,
};
use std::collections::BTreeMap;
use tracing::info;

/// Property edits: `Some` sets a value, `None` removes the key.
pub type PropertyChanges = BTreeMap<String, Option<PropertyValue>>;

fn check_editable(changes: &PropertyChanges, allowed: &[&str]) -> Result<()> {
    match changes.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(GraphError::UnsupportedOperation(format!(
            "property '{}' is not editable",
            key
        ))),
        None => Ok(()),
    }
}

fn apply(target: &mut BTreeMap<String, PropertyValue>, changes: &PropertyChanges) {
    for (key, value) in changes {
        match value {
            Some(value) => {
                target.insert(key.clone(), value.clone());
            }
            None => {
                target.remove(key);
            }
        }
    }
}

pub fn update_source_properties(state: &mut GraphState, source: NodeId, changes: &PropertyChanges) -> Result<()> {
    check_editable(changes, EDITABLE_SOURCE_PROPERTIES)?;
    state.source_meta(source)?;

    remove_source_meta_from_indexes(state, source);
    apply(&mut state.source_meta_mut(source)?.properties, changes);
    add_source_meta_to_indexes(state, source)?;

    info!("Updated {} properties on source node {}", changes.len(), source.index());
    Ok(())
}

pub fn update_tree_properties(state: &mut GraphState, root: NodeId, changes: &PropertyChanges) -> Result<()> {
    check_editable(changes, EDITABLE_TREE_PROPERTIES)?;
    state.tree_root(root)?;

    remove_tree_root_from_indexes(state, root);
    apply(&mut state.tree_root_mut(root)?.attributes, changes);
    add_tree_root_to_indexes(state, root)?;

    info!("Updated {} properties on tree root {}", changes.len(), root.index());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteRegistry;
    use crate::index::IndexName;
    use crate::mutation::add_source;
    use crate::node::Location;
    use crate::property::keys;
    use crate::registry::index_consistency;
    use sylva_core::{SourceDocument, Tree, TreeNode};

    fn changes(pairs: &[(&str, Option<&str>)]) -> PropertyChanges {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(PropertyValue::from)))
            .collect()
    }

    #[test]
    fn test_edit_source_reindexes() {
        let mut state = GraphState::new();
        let doc = SourceDocument::new().with_property(keys::CURATOR_NAME, "Jane");
        let source = add_source(&mut state, &RemoteRegistry::default(), &doc, "s", Location::Local, false)
            .unwrap()
            .source;

        update_source_properties(&mut state, source, &changes(&[(keys::CURATOR_NAME, Some("Joe"))])).unwrap();
        let idx = state.indexes();
        assert!(idx.search(IndexName::SourceMetaByProperty, keys::CURATOR_NAME, "jane").is_empty());
        assert_eq!(idx.search(IndexName::SourceMetaByProperty, keys::CURATOR_NAME, "joe"), vec![source]);
        index_consistency(&state, source).unwrap();

        update_source_properties(&mut state, source, &changes(&[(keys::CURATOR_NAME, None)])).unwrap();
        assert!(state.source_meta(source).unwrap().properties.is_empty());
        index_consistency(&state, source).unwrap();
    }

    #[test]
    fn test_edit_tree_rejects_protected_keys() {
        let mut state = GraphState::new();
        let doc = SourceDocument::new().with_tree(Tree::new(TreeNode::named("R")));
        let root = add_source(&mut state, &RemoteRegistry::default(), &doc, "s", Location::Local, false)
            .unwrap()
            .trees[0]
            .1;

        let bad = changes(&[(keys::TREE_ID, Some("other"))]);
        assert!(matches!(
            update_tree_properties(&mut state, root, &bad),
            Err(GraphError::UnsupportedOperation(_))
        ));

        update_tree_properties(&mut state, root, &changes(&[(keys::TAG, Some("nuclear"))])).unwrap();
        assert_eq!(
            state.indexes().query_multiple(IndexName::TreeRootsByProperty, keys::TAG, "nuclear"),
            vec![root]
        );
        index_consistency(&state, root).unwrap();
    }
}

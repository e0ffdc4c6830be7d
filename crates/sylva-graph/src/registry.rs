//! Index registry.
//!
//! [`SEARCHABLE_PROPERTIES`] is the single table describing which node
//! property lands in which secondary index under which key. Adding,
//! removing and checking index entries for roots and sources all go
//! through it, so the registry and the node content cannot drift apart.

use crate::error::{GraphError, Result};
use crate::graph::{GraphState, NodeId};
use crate::index::{IndexName, NodeClass};
use crate::node::GraphNode;
use crate::property::{keys, PropertyValue};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Shape of the value a searchable property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Int,
    TextList,
    IntList,
}

impl ValueKind {
    pub fn matches(self, value: &PropertyValue) -> bool {
        matches!(
            (self, value),
            (Self::Text, PropertyValue::Text(_))
                | (Self::Int, PropertyValue::Int(_))
                | (Self::TextList, PropertyValue::TextList(_))
                | (Self::IntList, PropertyValue::IntList(_))
        )
    }
}

/// A property that can be searched through a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchableProperty {
    /// Name used by callers (CLI flags, search requests).
    pub short_name: &'static str,
    /// Property key on the node.
    pub key: &'static str,
    pub class: NodeClass,
    pub index: IndexName,
    /// Key the values are stored under inside the index.
    pub index_key: &'static str,
    pub value_kind: ValueKind,
}

/// Key used by the taxon-name indexes.
pub const TAXON_NAME_KEY: &str = "name";

/// Key used by the taxon-id index.
pub const TAXON_UID_KEY: &str = "uid";

const fn tree_property(
    short_name: &'static str,
    key: &'static str,
    index: IndexName,
    index_key: &'static str,
    value_kind: ValueKind,
) -> SearchableProperty {
    SearchableProperty {
        short_name,
        key,
        class: NodeClass::TreeRoot,
        index,
        index_key,
        value_kind,
    }
}

const fn source_property(short_name: &'static str, key: &'static str, value_kind: ValueKind) -> SearchableProperty {
    SearchableProperty {
        short_name,
        key,
        class: NodeClass::SourceMeta,
        index: IndexName::SourceMetaByProperty,
        index_key: key,
        value_kind,
    }
}

pub const SEARCHABLE_PROPERTIES: &[SearchableProperty] = &[
    tree_property(
        "originalTaxonName",
        keys::ORIGINAL_TIP_NAMES,
        IndexName::TreeRootsByOriginalTaxonName,
        TAXON_NAME_KEY,
        ValueKind::TextList,
    ),
    tree_property(
        "taxonName",
        keys::MAPPED_TIP_NAMES,
        IndexName::TreeRootsByMappedTaxonName,
        TAXON_NAME_KEY,
        ValueKind::TextList,
    ),
    tree_property(
        "taxonNameNoSpaces",
        keys::MAPPED_TIP_NAMES_FOLDED,
        IndexName::TreeRootsByMappedTaxonNameFolded,
        TAXON_NAME_KEY,
        ValueKind::TextList,
    ),
    tree_property(
        "ottId",
        keys::MAPPED_TIP_OTT_IDS,
        IndexName::TreeRootsByOttId,
        TAXON_UID_KEY,
        ValueKind::IntList,
    ),
    tree_property(
        "treeTag",
        keys::TAG,
        IndexName::TreeRootsByProperty,
        keys::TAG,
        ValueKind::Text,
    ),
    tree_property(
        "branchLengthMode",
        keys::BRANCH_LENGTH_MODE,
        IndexName::TreeRootsByProperty,
        keys::BRANCH_LENGTH_MODE,
        ValueKind::Text,
    ),
    tree_property(
        "inGroupClade",
        keys::INGROUP_CLADE,
        IndexName::TreeRootsByProperty,
        keys::INGROUP_CLADE,
        ValueKind::Text,
    ),
    tree_property(
        "focalClade",
        keys::FOCAL_CLADE,
        IndexName::TreeRootsByProperty,
        keys::FOCAL_CLADE,
        ValueKind::Text,
    ),
    source_property("curator", keys::CURATOR_NAME, ValueKind::Text),
    source_property("dataDeposit", keys::DATA_DEPOSIT, ValueKind::Text),
    source_property("pubRef", keys::PUBLICATION_REFERENCE, ValueKind::Text),
    source_property("studyId", keys::STUDY_ID, ValueKind::Text),
    source_property("studyPublication", keys::STUDY_PUBLICATION, ValueKind::Text),
    source_property("tag", keys::TAG, ValueKind::Text),
    source_property("year", keys::STUDY_YEAR, ValueKind::Int),
];

/// Indexes written only with identity entries, never by the table.
const IDENTITY_INDEXES: [IndexName; 3] = [
    IndexName::TreeRootsByTreeId,
    IndexName::TreeRootsBySourceId,
    IndexName::SourceMetaBySourceId,
];

/// Checks [`SEARCHABLE_PROPERTIES`].
pub fn validate_registry() -> Result<()> {
    validate_properties(SEARCHABLE_PROPERTIES)
}

/// Checks a property table for class mismatches, entries that target an
/// identity index, and collisions.
pub fn validate_properties(table: &[SearchableProperty]) -> Result<()> {
    let mut short_names = HashSet::new();
    let mut slots = HashSet::new();
    for prop in table {
        if prop.index.class() != prop.class {
            return Err(GraphError::InvalidRegistry(format!(
                "{} targets {} which holds {:?} nodes, not {:?}",
                prop.short_name,
                prop.index,
                prop.index.class(),
                prop.class
            )));
        }
        if IDENTITY_INDEXES.contains(&prop.index) {
            return Err(GraphError::InvalidRegistry(format!(
                "{} targets the identity index {}",
                prop.short_name, prop.index
            )));
        }
        if !short_names.insert(prop.short_name) {
            return Err(GraphError::InvalidRegistry(format!(
                "duplicate short name {}",
                prop.short_name
            )));
        }
        if !slots.insert((prop.index, prop.index_key)) {
            return Err(GraphError::InvalidRegistry(format!(
                "{} reuses key {} in {}",
                prop.short_name, prop.index_key, prop.index
            )));
        }
    }
    Ok(())
}

/// Looks up a searchable property by short name.
pub fn find_property(short_name: &str) -> Option<&'static SearchableProperty> {
    SEARCHABLE_PROPERTIES
        .iter()
        .find(|prop| prop.short_name == short_name)
}

pub fn properties_for(class: NodeClass) -> impl Iterator<Item = &'static SearchableProperty> {
    SEARCHABLE_PROPERTIES
        .iter()
        .filter(move |prop| prop.class == class)
}

/// An index entry as `(index, key, value)`.
pub type IndexEntry = (IndexName, String, String);

/// The entries a node should have, derived from its current content.
pub fn expected_entries(node: &GraphNode) -> Vec<IndexEntry> {
    let mut out = Vec::new();
    let class = match node {
        GraphNode::Tree(data) => {
            let Some(root) = data.root.as_deref() else {
                return out;
            };
            out.push((
                IndexName::TreeRootsByTreeId,
                root.location.tree_id_key(),
                root.tree_id.clone(),
            ));
            out.push((
                IndexName::TreeRootsBySourceId,
                root.location.source_id_key(),
                root.source_id.clone(),
            ));
            NodeClass::TreeRoot
        }
        GraphNode::Source(meta) => {
            out.push((
                IndexName::SourceMetaBySourceId,
                meta.location.source_id_key(),
                meta.source_id.clone(),
            ));
            NodeClass::SourceMeta
        }
    };

    for prop in properties_for(class) {
        let Some(value) = node.property(prop.key) else {
            continue;
        };
        if !prop.value_kind.matches(&value) {
            debug!("skipping {}: expected {:?}, got {:?}", prop.short_name, prop.value_kind, value);
            continue;
        }
        for term in value.index_terms() {
            out.push((prop.index, prop.index_key.to_string(), term));
        }
    }
    out
}

fn add_entries(state: &mut GraphState, node: NodeId) -> Result<()> {
    let entries = expected_entries(state.node(node)?);
    for (index, key, value) in entries {
        state.indexes_mut().add(index, node, &key, &value);
    }
    Ok(())
}

/// Registers a tree root under its identity keys and declared properties.
pub fn add_tree_root_to_indexes(state: &mut GraphState, root: NodeId) -> Result<()> {
    state.tree_root(root)?;
    add_entries(state, root)
}

/// Registers a source under its identity key and declared properties.
pub fn add_source_meta_to_indexes(state: &mut GraphState, source: NodeId) -> Result<()> {
    state.source_meta(source)?;
    add_entries(state, source)
}

/// Drops `node` from every tree-root index, whatever it was added under.
pub fn remove_tree_root_from_indexes(state: &mut GraphState, root: NodeId) {
    for index in IndexName::for_class(NodeClass::TreeRoot) {
        state.indexes_mut().remove_node(index, root);
    }
}

/// Drops `node` from every source index.
pub fn remove_source_meta_from_indexes(state: &mut GraphState, source: NodeId) {
    for index in IndexName::for_class(NodeClass::SourceMeta) {
        state.indexes_mut().remove_node(index, source);
    }
}

/// Compares the entries held for `node` with those its content implies.
pub fn index_consistency(state: &GraphState, node: NodeId) -> Result<()> {
    let expected: BTreeSet<IndexEntry> = expected_entries(state.node(node)?).into_iter().collect();
    let mut actual = BTreeSet::new();
    for index in IndexName::ALL {
        for (key, value) in state.indexes().entries_for(index, node) {
            actual.insert((index, key, value));
        }
    }
    if expected == actual {
        return Ok(());
    }
    let missing: Vec<_> = expected.difference(&actual).collect();
    let stale: Vec<_> = actual.difference(&expected).collect();
    Err(GraphError::Corruption(format!(
        "index entries for node {} out of date: missing {:?}, stale {:?}",
        node.index(),
        missing,
        stale
    )))
}

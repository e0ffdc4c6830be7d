//! Typed records stored on graph nodes.
//!
//! Every graph node is either a tree node or a source metadata node. Tree
//! level fields live in a [`TreeRoot`] record that only the root of a tree
//! carries, so moving the root is a swap of one record between two nodes.

use crate::property::{keys, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a source (and its trees) lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Location {
    Local,
    Remote(String),
}

impl Location {
    pub const LOCAL: &'static str = "local";

    /// Parses a location tag. Anything other than `"local"` names a remote.
    pub fn parse(tag: &str) -> Self {
        if tag == Self::LOCAL {
            Self::Local
        } else {
            Self::Remote(tag.to_string())
        }
    }

    pub fn remote(name: impl Into<String>) -> Self {
        Self::Remote(name.into())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Local => Self::LOCAL,
            Self::Remote(name) => name,
        }
    }

    /// Identity key used for tree-id uniqueness lookups in this location.
    pub fn tree_id_key(&self) -> String {
        format!("{}TreeId", self.as_str())
    }

    /// Identity key used for source-id uniqueness lookups in this location.
    pub fn source_id_key(&self) -> String {
        format!("{}SourceId", self.as_str())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tip-taxon arrays cached on a root at import time.
///
/// They are not kept in sync if the tree topology changes afterwards;
/// rerooting preserves the leaf set, so they stay valid across reroots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TipTaxa {
    pub original_names: Vec<String>,
    pub mapped_names: Vec<String>,
    pub mapped_names_folded: Vec<String>,
    pub mapped_ott_ids: Vec<i64>,
}

/// Tree-level fields, carried by the root node only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRoot {
    pub tree_id: String,
    pub source_id: String,
    pub location: Location,
    pub rooting_is_set: bool,
    pub ingroup_is_set: bool,
    pub tip_taxa: TipTaxa,
    /// Root-level attributes copied from the imported tree.
    pub attributes: BTreeMap<String, PropertyValue>,
}

impl TreeRoot {
    pub fn new(tree_id: impl Into<String>, source_id: impl Into<String>, location: Location) -> Self {
        Self {
            tree_id: tree_id.into(),
            source_id: source_id.into(),
            location,
            rooting_is_set: false,
            ingroup_is_set: false,
            tip_taxa: TipTaxa::default(),
            attributes: BTreeMap::new(),
        }
    }

    fn property(&self, key: &str) -> Option<PropertyValue> {
        let value = match key {
            keys::IS_ROOT => PropertyValue::Bool(true),
            keys::TREE_ID => PropertyValue::Text(self.tree_id.clone()),
            keys::SOURCE_ID => PropertyValue::Text(self.source_id.clone()),
            keys::LOCATION => PropertyValue::Text(self.location.to_string()),
            keys::ROOTING_IS_SET => PropertyValue::Bool(self.rooting_is_set),
            keys::INGROUP_IS_SET => PropertyValue::Bool(self.ingroup_is_set),
            keys::ORIGINAL_TIP_NAMES => PropertyValue::TextList(self.tip_taxa.original_names.clone()),
            keys::MAPPED_TIP_NAMES => PropertyValue::TextList(self.tip_taxa.mapped_names.clone()),
            keys::MAPPED_TIP_NAMES_FOLDED => {
                PropertyValue::TextList(self.tip_taxa.mapped_names_folded.clone())
            }
            keys::MAPPED_TIP_OTT_IDS => PropertyValue::IntList(self.tip_taxa.mapped_ott_ids.clone()),
            other => return self.attributes.get(other).cloned(),
        };
        Some(value)
    }

    fn property_keys(&self) -> Vec<String> {
        let mut out: Vec<String> = [
            keys::IS_ROOT,
            keys::TREE_ID,
            keys::SOURCE_ID,
            keys::LOCATION,
            keys::ROOTING_IS_SET,
            keys::INGROUP_IS_SET,
            keys::ORIGINAL_TIP_NAMES,
            keys::MAPPED_TIP_NAMES,
            keys::MAPPED_TIP_NAMES_FOLDED,
            keys::MAPPED_TIP_OTT_IDS,
        ]
        .iter()
        .map(|k| k.to_string())
        .collect();
        out.extend(self.attributes.keys().cloned());
        out
    }
}

/// A node of a persisted tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNodeData {
    pub name: Option<String>,
    pub original_label: Option<String>,
    pub branch_length: Option<f64>,
    pub ott_id: Option<i64>,
    pub within_ingroup: bool,
    /// Present exactly on the root of a tree.
    pub root: Option<Box<TreeRoot>>,
}

impl TreeNodeData {
    pub fn named(name: Option<String>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.root.is_some()
    }
}

/// Metadata describing one source in one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMeta {
    pub source_id: String,
    pub location: Location,
    /// Curation properties copied verbatim from the imported document.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl SourceMeta {
    pub fn new(source_id: impl Into<String>, location: Location) -> Self {
        Self {
            source_id: source_id.into(),
            location,
            properties: BTreeMap::new(),
        }
    }
}

/// The weight of a node in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphNode {
    Tree(TreeNodeData),
    Source(SourceMeta),
}

impl GraphNode {
    pub fn as_tree(&self) -> Option<&TreeNodeData> {
        match self {
            Self::Tree(data) => Some(data),
            Self::Source(_) => None,
        }
    }

    pub fn as_tree_mut(&mut self) -> Option<&mut TreeNodeData> {
        match self {
            Self::Tree(data) => Some(data),
            Self::Source(_) => None,
        }
    }

    pub fn as_source(&self) -> Option<&SourceMeta> {
        match self {
            Self::Source(meta) => Some(meta),
            Self::Tree(_) => None,
        }
    }

    pub fn as_source_mut(&mut self) -> Option<&mut SourceMeta> {
        match self {
            Self::Source(meta) => Some(meta),
            Self::Tree(_) => None,
        }
    }

    pub fn tree_root(&self) -> Option<&TreeRoot> {
        self.as_tree()?.root.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.tree_root().is_some()
    }

    /// Reads a property by key.
    ///
    /// This is the string-keyed view used by the index registry and the
    /// metadata projections; the typed fields remain the source of truth.
    pub fn property(&self, key: &str) -> Option<PropertyValue> {
        match self {
            Self::Tree(data) => match key {
                keys::NAME => data.name.clone().map(PropertyValue::Text),
                keys::ORIGINAL_LABEL => data.original_label.clone().map(PropertyValue::Text),
                keys::BRANCH_LENGTH => data.branch_length.map(PropertyValue::Float),
                keys::OTT_ID => data.ott_id.map(PropertyValue::Int),
                keys::IS_WITHIN_INGROUP => Some(PropertyValue::Bool(data.within_ingroup)),
                other => data.root.as_ref()?.property(other),
            },
            Self::Source(meta) => match key {
                keys::SOURCE_ID => Some(PropertyValue::Text(meta.source_id.clone())),
                keys::LOCATION => Some(PropertyValue::Text(meta.location.to_string())),
                other => meta.properties.get(other).cloned(),
            },
        }
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.property(key).is_some()
    }

    /// Keys of every property currently present on the node.
    pub fn property_keys(&self) -> Vec<String> {
        match self {
            Self::Tree(data) => {
                let mut out = Vec::new();
                if data.name.is_some() {
                    out.push(keys::NAME.to_string());
                }
                if data.original_label.is_some() {
                    out.push(keys::ORIGINAL_LABEL.to_string());
                }
                if data.branch_length.is_some() {
                    out.push(keys::BRANCH_LENGTH.to_string());
                }
                if data.ott_id.is_some() {
                    out.push(keys::OTT_ID.to_string());
                }
                out.push(keys::IS_WITHIN_INGROUP.to_string());
                if let Some(root) = &data.root {
                    out.extend(root.property_keys());
                }
                out
            }
            Self::Source(meta) => {
                let mut out = vec![keys::SOURCE_ID.to_string(), keys::LOCATION.to_string()];
                out.extend(meta.properties.keys().cloned());
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_keys() {
        assert_eq!(Location::Local.tree_id_key(), "localTreeId");
        assert_eq!(Location::remote("treebase").source_id_key(), "treebaseSourceId");
        assert_eq!(Location::parse("local"), Location::Local);
        assert_eq!(Location::parse("treebase"), Location::remote("treebase"));
    }

    #[test]
    fn test_root_properties_only_on_root() {
        let plain = GraphNode::Tree(TreeNodeData::named(Some("A".into())));
        assert_eq!(plain.property(keys::NAME), Some(PropertyValue::from("A")));
        assert_eq!(plain.property(keys::TREE_ID), None);
        assert!(!plain.has_property(keys::IS_ROOT));

        let mut data = TreeNodeData::default();
        let mut root = TreeRoot::new("s1_t1", "s1", Location::Local);
        root.attributes.insert(keys::TAG.to_string(), PropertyValue::from("mito"));
        data.root = Some(Box::new(root));
        let node = GraphNode::Tree(data);
        assert_eq!(node.property(keys::IS_ROOT), Some(PropertyValue::Bool(true)));
        assert_eq!(node.property(keys::LOCATION), Some(PropertyValue::from("local")));
        assert_eq!(node.property(keys::TAG), Some(PropertyValue::from("mito")));
        assert!(node.property_keys().contains(&keys::TAG.to_string()));
    }

    #[test]
    fn test_source_properties() {
        let mut meta = SourceMeta::new("pg_10", Location::Local);
        meta.properties.insert(keys::STUDY_YEAR.to_string(), PropertyValue::Int(2011));
        let node = GraphNode::Source(meta);
        assert_eq!(node.property(keys::SOURCE_ID), Some(PropertyValue::from("pg_10")));
        assert_eq!(node.property(keys::STUDY_YEAR), Some(PropertyValue::Int(2011)));
        assert!(node.as_tree().is_none());
    }
}

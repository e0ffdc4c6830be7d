//! Read-only queries over committed state.
//!
//! A [`Browser`] borrows the graph and the store configuration; it never
//! writes, so it needs no transaction.

use crate::config::StoreConfig;
use crate::edge::EdgeKind;
use crate::error::{GraphError, Result};
use crate::graph::{GraphState, NodeId};
use crate::index::{IndexName, NodeClass};
use crate::node::{GraphNode, Location, TreeNodeData};
use crate::property::{VISIBLE_OTU_PROPERTIES, VISIBLE_SOURCE_PROPERTIES, VISIBLE_TREE_PROPERTIES};
use crate::registry::{find_property, TAXON_NAME_KEY, TAXON_UID_KEY};
use petgraph::Direction;
use serde_json::Value;
use std::collections::BTreeMap;
use sylva_core::{attrs, fold_whitespace, Tree, TreeNode};

/// Subtree attribute: graph id of the node.
pub const NODE_ID_ATTR: &str = "node_id";
/// Subtree attribute: number of children in the graph (internal nodes only).
pub const CHILD_COUNT_ATTR: &str = "child_count";
/// Subtree attribute: node is inside the designated ingroup.
pub const INGROUP_ATTR: &str = "ingroup";
/// Subtree attribute: some children were cut by the size cap.
pub const INCOMPLETE_ATTR: &str = "incomplete";
/// Subtree attribute: ancestor shown above the requested node.
pub const BREADCRUMB_ATTR: &str = "breadcrumb";

/// Key listing a source's tree ids in its metadata.
pub const TREE_IDS_KEY: &str = "tree_ids";

/// Which cached tip-name array a taxon lookup goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonField {
    Original,
    Mapped,
    MappedFolded,
}

impl TaxonField {
    fn index(self) -> IndexName {
        match self {
            Self::Original => IndexName::TreeRootsByOriginalTaxonName,
            Self::Mapped => IndexName::TreeRootsByMappedTaxonName,
            Self::MappedFolded => IndexName::TreeRootsByMappedTaxonNameFolded,
        }
    }

    fn normalize(self, name: &str) -> String {
        match self {
            Self::MappedFolded => fold_whitespace(name),
            _ => name.to_string(),
        }
    }
}

pub type Metadata = BTreeMap<String, Value>;

pub struct Browser<'a> {
    state: &'a GraphState,
    config: &'a StoreConfig,
}

impl<'a> Browser<'a> {
    pub fn new(state: &'a GraphState, config: &'a StoreConfig) -> Self {
        Self { state, config }
    }

    pub fn source_meta_node(&self, source_id: &str, location: &Location) -> Result<Option<NodeId>> {
        self.state
            .indexes()
            .query_unique(IndexName::SourceMetaBySourceId, &location.source_id_key(), source_id)
    }

    pub fn require_source(&self, source_id: &str, location: &Location) -> Result<NodeId> {
        self.source_meta_node(source_id, location)?
            .ok_or_else(|| GraphError::source_not_found(format!("{} ({})", source_id, location)))
    }

    pub fn tree_root_node(&self, tree_id: &str, location: &Location) -> Result<Option<NodeId>> {
        self.state
            .indexes()
            .query_unique(IndexName::TreeRootsByTreeId, &location.tree_id_key(), tree_id)
    }

    pub fn require_tree(&self, tree_id: &str, location: &Location) -> Result<NodeId> {
        self.tree_root_node(tree_id, location)?
            .ok_or_else(|| GraphError::tree_not_found(format!("{} ({})", tree_id, location)))
    }

    /// The source node for `source_id` in every location where it exists,
    /// local first.
    pub fn known_source_copies(&self, source_id: &str) -> Result<Vec<(Location, NodeId)>> {
        let mut out = Vec::new();
        let locations = std::iter::once(Location::Local).chain(self.config.known_remotes.locations());
        for location in locations {
            if let Some(node) = self.source_meta_node(source_id, &location)? {
                out.push((location, node));
            }
        }
        Ok(out)
    }

    /// Source ids in `location`, sorted, minus `exclude`.
    pub fn source_ids(&self, location: &Location, exclude: &[String]) -> Vec<String> {
        let mut ids: Vec<String> = self
            .state
            .indexes()
            .query_key(IndexName::SourceMetaBySourceId, &location.source_id_key())
            .into_iter()
            .filter_map(|node| self.state.source_meta(node).ok())
            .map(|meta| meta.source_id.clone())
            .filter(|id| !exclude.contains(id))
            .collect();
        ids.sort();
        ids
    }

    /// Roots of the trees owned by `source`, in import order.
    pub fn tree_roots(&self, source: NodeId) -> Result<Vec<NodeId>> {
        self.state.source_meta(source)?;
        Ok(self
            .state
            .edges_of(source, Some(EdgeKind::MetadataFor), Direction::Outgoing)
            .into_iter()
            .map(|edge| edge.target)
            .collect())
    }

    pub fn tree_ids(&self, source: NodeId) -> Result<Vec<String>> {
        self.tree_roots(source)?
            .into_iter()
            .map(|root| Ok(self.state.tree_root(root)?.tree_id.clone()))
            .collect()
    }

    /// Every source in `location` with its tree ids.
    pub fn source_tree_pairs(&self, location: &Location) -> Result<Vec<(String, Vec<String>)>> {
        let mut out = Vec::new();
        for source_id in self.source_ids(location, &[]) {
            let source = self.require_source(&source_id, location)?;
            out.push((source_id, self.tree_ids(source)?));
        }
        Ok(out)
    }

    pub fn source_of_tree(&self, root: NodeId) -> Result<NodeId> {
        self.state
            .single_edge(root, EdgeKind::MetadataFor, Direction::Incoming)?
            .map(|edge| edge.source)
            .ok_or_else(|| GraphError::NotFound {
                kind: "source of tree",
                id: root.index().to_string(),
            })
    }

    pub fn root_of(&self, node: NodeId) -> Result<NodeId> {
        self.state.root_of(node)
    }

    /// Fetches at most `max_nodes` nodes below `node`, breadth first,
    /// wrapped in up to `breadcrumb_depth` ancestors.
    ///
    /// Uses the configured cap when `max_nodes` is `None`.
    pub fn subtree(&self, node: NodeId, max_nodes: Option<usize>) -> Result<Tree> {
        self.state.tree_data(node)?;
        let cap = max_nodes.unwrap_or(self.config.max_subtree_nodes).max(1);

        // (graph node, parent position) in BFS order
        let mut order: Vec<(NodeId, Option<usize>)> = vec![(node, None)];
        let mut next = 0;
        while next < order.len() && order.len() < cap {
            let (current, _) = order[next];
            for child in self.state.children(current) {
                if order.len() >= cap {
                    break;
                }
                order.push((child, Some(next)));
            }
            next += 1;
        }

        let mut built: Vec<Option<TreeNode>> = Vec::with_capacity(order.len());
        let mut included = vec![0usize; order.len()];
        for (_, parent) in &order {
            if let Some(parent) = parent {
                included[*parent] += 1;
            }
        }
        for (position, (id, _)) in order.iter().enumerate() {
            let mut value = self.value_of(*id)?;
            let total = self.state.children(*id).len();
            if included[position] < total {
                value = value.with_attribute(INCOMPLETE_ATTR, true);
            }
            built.push(Some(value));
        }

        // children always sit after their parent in BFS order
        for position in (1..order.len()).rev() {
            let Some(parent) = order[position].1 else {
                continue;
            };
            if let Some(mut child) = built[position].take() {
                child.children.reverse();
                if let Some(parent_value) = built[parent].as_mut() {
                    parent_value.children.push(child);
                }
            }
        }
        let mut result = built[0].take().ok_or_else(|| GraphError::node_not_found(node))?;
        result.children.reverse();

        let mut current = node;
        for _ in 0..self.config.breadcrumb_depth {
            let Some(parent) = self.state.parent(current)? else {
                break;
            };
            result = self
                .value_of(parent)?
                .with_attribute(BREADCRUMB_ATTR, true)
                .with_child(result);
            current = parent;
        }
        Ok(Tree::new(result))
    }

    /// Builds the tree value for one graph node, without children.
    fn value_of(&self, node: NodeId) -> Result<TreeNode> {
        let data: &TreeNodeData = self.state.tree_data(node)?;
        let mut value = TreeNode::new().with_attribute(NODE_ID_ATTR, node.index() as u64);
        value.name = data.name.clone();
        if let Some(length) = data.branch_length {
            value.set_branch_length(length);
        }
        if let Some(label) = &data.original_label {
            value = value.with_attribute(attrs::ORIGINAL_LABEL, label.as_str());
        }
        if let Some(ott_id) = data.ott_id {
            value = value.with_attribute(attrs::OTT_ID, ott_id);
        }
        let child_count = self.state.children(node).len();
        if child_count > 0 {
            value = value.with_attribute(CHILD_COUNT_ATTR, child_count as u64);
        }
        if data.within_ingroup {
            value = value.with_attribute(INGROUP_ATTR, true);
        }
        Ok(value)
    }

    /// Tips of the subtree rooted at `node`, breadth first.
    pub fn descendant_tips(&self, node: NodeId) -> Result<Vec<NodeId>> {
        self.state.tree_data(node)?;
        Ok(self
            .state
            .tree_nodes(node)
            .into_iter()
            .filter(|n| self.state.children(*n).is_empty())
            .collect())
    }

    /// Tips of every materialized tree of `source`.
    pub fn otus_for_source(&self, source: NodeId) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for root in self.tree_roots(source)? {
            out.extend(self.descendant_tips(root)?);
        }
        Ok(out)
    }

    fn project(node: &GraphNode, visible: &[&str]) -> Metadata {
        visible
            .iter()
            .filter_map(|key| Some((key.to_string(), node.property(key)?.to_json())))
            .collect()
    }

    /// Visible source properties plus the source's tree ids.
    pub fn source_metadata(&self, source: NodeId) -> Result<Metadata> {
        let node = self.state.node(source)?;
        self.state.source_meta(source)?;
        let mut out = Self::project(node, VISIBLE_SOURCE_PROPERTIES);
        out.insert(TREE_IDS_KEY.to_string(), Value::from(self.tree_ids(source)?));
        Ok(out)
    }

    pub fn tree_metadata(&self, root: NodeId) -> Result<Metadata> {
        self.state.tree_root(root)?;
        Ok(Self::project(self.state.node(root)?, VISIBLE_TREE_PROPERTIES))
    }

    pub fn otu_metadata(&self, node: NodeId) -> Result<Metadata> {
        self.state.tree_data(node)?;
        Ok(Self::project(self.state.node(node)?, VISIBLE_OTU_PROPERTIES))
    }

    /// Roots of trees with a tip named exactly `name`.
    pub fn trees_with_taxon(&self, field: TaxonField, name: &str) -> Vec<NodeId> {
        self.state
            .indexes()
            .query_multiple(field.index(), TAXON_NAME_KEY, &field.normalize(name))
    }

    /// Roots of trees with a tip name containing `query`, case-insensitively.
    pub fn search_taxon(&self, field: TaxonField, query: &str) -> Vec<NodeId> {
        self.state
            .indexes()
            .search(field.index(), TAXON_NAME_KEY, &field.normalize(query))
    }

    pub fn trees_with_ott_id(&self, ott_id: i64) -> Vec<NodeId> {
        self.state
            .indexes()
            .query_multiple(IndexName::TreeRootsByOttId, TAXON_UID_KEY, &ott_id.to_string())
    }

    fn search_property(&self, class: NodeClass, short_name: &str, query: &str) -> Result<Vec<NodeId>> {
        let prop = find_property(short_name)
            .filter(|prop| prop.class == class)
            .ok_or_else(|| {
                GraphError::UnsupportedOperation(format!("'{}' is not a searchable property", short_name))
            })?;
        Ok(self.state.indexes().search(prop.index, prop.index_key, query))
    }

    /// Sources whose property `short_name` contains `query`.
    pub fn search_sources(&self, short_name: &str, query: &str) -> Result<Vec<NodeId>> {
        self.search_property(NodeClass::SourceMeta, short_name, query)
    }

    /// Tree roots whose property `short_name` contains `query`.
    pub fn search_trees(&self, short_name: &str, query: &str) -> Result<Vec<NodeId>> {
        self.search_property(NodeClass::TreeRoot, short_name, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteRegistry;
    use crate::mutation::add_source;
    use crate::property::keys;
    use sylva_core::SourceDocument;

    fn primates() -> Tree {
        Tree::new(
            TreeNode::named("root")
                .with_attribute(attrs::TREE_ID, "t1")
                .with_attribute(keys::TAG, "mito")
                .with_child(
                    TreeNode::named("Hominini")
                        .with_child(TreeNode::named("Homo sapiens").with_attribute(attrs::OTT_ID, 770315))
                        .with_child(TreeNode::named("Pan troglodytes")),
                )
                .with_child(TreeNode::named("Gorilla gorilla")),
        )
    }

    fn setup() -> (GraphState, StoreConfig, NodeId, NodeId) {
        let mut state = GraphState::new();
        let doc = SourceDocument::new()
            .with_property(keys::CURATOR_NAME, "Jane Doe")
            .with_property(keys::STUDY_YEAR, 2011)
            .with_tree(primates());
        let report = add_source(&mut state, &RemoteRegistry::default(), &doc, "pg_1", Location::Local, false).unwrap();
        (state, StoreConfig::default(), report.source, report.trees[0].1)
    }

    fn names(node: &TreeNode) -> Vec<String> {
        node.preorder()
            .map(|n| n.name.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_lookups() {
        let (state, config, source, root) = setup();
        let browser = Browser::new(&state, &config);
        assert_eq!(browser.require_source("pg_1", &Location::Local).unwrap(), source);
        assert!(matches!(
            browser.require_source("pg_2", &Location::Local),
            Err(GraphError::NotFound { .. })
        ));
        assert_eq!(browser.require_tree("pg_1_t1", &Location::Local).unwrap(), root);
        assert_eq!(browser.source_ids(&Location::Local, &[]), vec!["pg_1"]);
        assert!(browser.source_ids(&Location::Local, &["pg_1".to_string()]).is_empty());
        assert_eq!(browser.tree_ids(source).unwrap(), vec!["pg_1_t1"]);
        assert_eq!(browser.source_of_tree(root).unwrap(), source);
        assert_eq!(browser.known_source_copies("pg_1").unwrap(), vec![(Location::Local, source)]);
        assert_eq!(
            browser.source_tree_pairs(&Location::Local).unwrap(),
            vec![("pg_1".to_string(), vec!["pg_1_t1".to_string()])]
        );
    }

    #[test]
    fn test_subtree_round_trip() {
        let (state, config, _, root) = setup();
        let browser = Browser::new(&state, &config);
        let tree = browser.subtree(root, None).unwrap();
        assert_eq!(names(&tree.root), names(&primates().root));
        assert!(tree.preorder().all(|n| !n.has_flag(INCOMPLETE_ATTR)));
        assert_eq!(tree.root.attribute(CHILD_COUNT_ATTR), Some(&Value::from(2u64)));
    }

    #[test]
    fn test_subtree_cap_and_breadcrumbs() {
        let (state, config, _, root) = setup();
        let browser = Browser::new(&state, &config);

        let capped = browser.subtree(root, Some(2)).unwrap();
        assert_eq!(capped.node_count(), 2);
        assert!(capped.root.has_flag(INCOMPLETE_ATTR));

        let hominini = state.children(root)[0];
        let nested = browser.subtree(hominini, None).unwrap();
        assert_eq!(nested.root.name.as_deref(), Some("root"));
        assert!(nested.root.has_flag(BREADCRUMB_ATTR));
        assert_eq!(nested.root.children.len(), 1);
        assert_eq!(nested.root.children[0].name.as_deref(), Some("Hominini"));
    }

    #[test]
    fn test_metadata_allow_lists() {
        let (state, config, source, root) = setup();
        let browser = Browser::new(&state, &config);

        let source_meta = browser.source_metadata(source).unwrap();
        assert_eq!(source_meta.get(keys::CURATOR_NAME), Some(&Value::from("Jane Doe")));
        assert_eq!(source_meta.get(TREE_IDS_KEY), Some(&Value::from(vec!["pg_1_t1"])));
        assert!(!source_meta.contains_key(keys::LOCATION));
        assert!(!source_meta.contains_key(keys::SOURCE_ID));

        let tree_meta = browser.tree_metadata(root).unwrap();
        assert_eq!(tree_meta.get(keys::TAG), Some(&Value::from("mito")));
        assert_eq!(tree_meta.get(keys::ROOTING_IS_SET), Some(&Value::from(false)));
        assert!(!tree_meta.contains_key(keys::MAPPED_TIP_NAMES));

        let tip = browser.descendant_tips(root).unwrap()[0];
        let otu = browser.otu_metadata(tip).unwrap();
        assert_eq!(otu.get(keys::NAME), Some(&Value::from("Gorilla gorilla")));
        assert_eq!(otu.get(keys::IS_WITHIN_INGROUP), Some(&Value::from(false)));
    }

    #[test]
    fn test_taxon_searches() {
        let (state, config, source, root) = setup();
        let browser = Browser::new(&state, &config);
        assert_eq!(browser.trees_with_taxon(TaxonField::Mapped, "Homo sapiens"), vec![root]);
        assert_eq!(browser.trees_with_taxon(TaxonField::MappedFolded, "Homo  sapiens"), vec![root]);
        assert_eq!(browser.search_taxon(TaxonField::Original, "troglo"), vec![root]);
        assert_eq!(browser.trees_with_ott_id(770315), vec![root]);
        assert!(browser.trees_with_taxon(TaxonField::Mapped, "Homo").is_empty());

        assert_eq!(browser.search_sources("curator", "doe").unwrap(), vec![source]);
        assert_eq!(browser.search_trees("treeTag", "MIT").unwrap(), vec![root]);
        assert!(browser.search_sources("treeTag", "mito").is_err());
        assert_eq!(browser.otus_for_source(source).unwrap().len(), 3);
    }
}

//! Secondary indexes.
//!
//! Each index maps `(key, value)` pairs to the set of nodes holding them
//! and keeps a reverse posting list per node, so a node can be dropped from
//! an index without knowing which values it was added under. Full-text
//! indexes additionally feed a [`SearchIndex`] per key.

use crate::error::{GraphError, Result};
use crate::graph::NodeId;
use crate::search_index::SearchIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// The node class an index (or a searchable property) applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    TreeRoot,
    SourceMeta,
}

/// How values in an index are matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Exact `(key, value)` lookup only.
    Exact,
    /// Exact lookup plus case-insensitive substring search.
    FullText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexName {
    TreeRootsByTreeId,
    TreeRootsBySourceId,
    TreeRootsByOriginalTaxonName,
    TreeRootsByMappedTaxonName,
    TreeRootsByMappedTaxonNameFolded,
    TreeRootsByOttId,
    TreeRootsByProperty,
    SourceMetaBySourceId,
    SourceMetaByProperty,
}

impl IndexName {
    pub const ALL: [IndexName; 9] = [
        Self::TreeRootsByTreeId,
        Self::TreeRootsBySourceId,
        Self::TreeRootsByOriginalTaxonName,
        Self::TreeRootsByMappedTaxonName,
        Self::TreeRootsByMappedTaxonNameFolded,
        Self::TreeRootsByOttId,
        Self::TreeRootsByProperty,
        Self::SourceMetaBySourceId,
        Self::SourceMetaByProperty,
    ];

    pub fn kind(self) -> IndexKind {
        match self {
            Self::TreeRootsByOriginalTaxonName
            | Self::TreeRootsByMappedTaxonName
            | Self::TreeRootsByMappedTaxonNameFolded
            | Self::SourceMetaByProperty => IndexKind::FullText,
            _ => IndexKind::Exact,
        }
    }

    pub fn class(self) -> NodeClass {
        match self {
            Self::SourceMetaBySourceId | Self::SourceMetaByProperty => NodeClass::SourceMeta,
            _ => NodeClass::TreeRoot,
        }
    }

    /// Every index holding nodes of `class`.
    pub fn for_class(class: NodeClass) -> impl Iterator<Item = IndexName> {
        Self::ALL.into_iter().filter(move |index| index.class() == class)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TreeRootsByTreeId => "treeRootNodesByTreeId",
            Self::TreeRootsBySourceId => "treeRootNodesBySourceId",
            Self::TreeRootsByOriginalTaxonName => "treeRootNodesByOriginalTaxonName",
            Self::TreeRootsByMappedTaxonName => "treeRootNodesByMappedTaxonName",
            Self::TreeRootsByMappedTaxonNameFolded => "treeRootNodesByMappedTaxonNameNoSpaces",
            Self::TreeRootsByOttId => "treeRootNodesByMappedTaxonOTTId",
            Self::TreeRootsByProperty => "treeRootNodesByOtherProperty",
            Self::SourceMetaBySourceId => "sourceMetaNodesBySourceId",
            Self::SourceMetaByProperty => "sourceMetaNodesByOtherProperty",
        }
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type Entry = (String, String);

/// One secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryIndex {
    kind: IndexKind,
    entries: BTreeMap<Entry, BTreeSet<NodeId>>,
    postings: BTreeMap<NodeId, BTreeSet<Entry>>,
    text: BTreeMap<String, SearchIndex>,
}

impl SecondaryIndex {
    pub fn new(kind: IndexKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            postings: BTreeMap::new(),
            text: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Adds an entry. Adding the same entry twice is a no-op.
    pub fn add(&mut self, node: NodeId, key: &str, value: &str) {
        let entry = (key.to_string(), value.to_string());
        if !self.entries.entry(entry.clone()).or_default().insert(node) {
            return;
        }
        self.postings.entry(node).or_default().insert(entry);
        if self.kind == IndexKind::FullText {
            self.text.entry(key.to_string()).or_default().insert(value, node);
        }
    }

    /// Removes a single entry. Returns true if it was present.
    pub fn remove_entry(&mut self, node: NodeId, key: &str, value: &str) -> bool {
        let entry = (key.to_string(), value.to_string());
        let removed = match self.entries.get_mut(&entry) {
            Some(nodes) => {
                let removed = nodes.remove(&node);
                if nodes.is_empty() {
                    self.entries.remove(&entry);
                }
                removed
            }
            None => false,
        };
        if !removed {
            return false;
        }
        if let Some(posted) = self.postings.get_mut(&node) {
            posted.remove(&entry);
            if posted.is_empty() {
                self.postings.remove(&node);
            }
        }
        if let Some(text) = self.text.get_mut(key) {
            text.remove(value, node);
            if text.is_empty() {
                self.text.remove(key);
            }
        }
        true
    }

    /// Removes every entry for `node`. Returns how many were removed.
    pub fn remove_node(&mut self, node: NodeId) -> usize {
        let posted = self.postings.get(&node).cloned().unwrap_or_default();
        let mut removed = 0;
        for (key, value) in &posted {
            if self.remove_entry(node, key, value) {
                removed += 1;
            }
        }
        removed
    }

    pub fn query(&self, key: &str, value: &str) -> Vec<NodeId> {
        self.entries
            .get(&(key.to_string(), value.to_string()))
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every node with any value under `key`.
    pub fn query_key(&self, key: &str) -> Vec<NodeId> {
        let mut out: BTreeSet<NodeId> = BTreeSet::new();
        for ((k, _), nodes) in &self.entries {
            if k == key {
                out.extend(nodes.iter().copied());
            }
        }
        out.into_iter().collect()
    }

    /// Case-insensitive substring search over the values under `key`.
    pub fn search(&self, key: &str, query: &str) -> Vec<NodeId> {
        match self.kind {
            IndexKind::FullText => self
                .text
                .get(key)
                .map(|text| text.search(query))
                .unwrap_or_default(),
            IndexKind::Exact => {
                let needle = query.to_lowercase();
                let mut out: BTreeSet<NodeId> = BTreeSet::new();
                for ((k, v), nodes) in &self.entries {
                    if k == key && v.to_lowercase().contains(&needle) {
                        out.extend(nodes.iter().copied());
                    }
                }
                out.into_iter().collect()
            }
        }
    }

    pub fn entries_for(&self, node: NodeId) -> Vec<(String, String)> {
        self.postings
            .get(&node)
            .map(|posted| posted.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn references(&self, node: NodeId) -> bool {
        self.postings.contains_key(&node)
    }

    /// Number of distinct `(key, value)` entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All secondary indexes of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSet {
    indexes: BTreeMap<IndexName, SecondaryIndex>,
}

impl Default for IndexSet {
    fn default() -> Self {
        Self {
            indexes: IndexName::ALL
                .into_iter()
                .map(|name| (name, SecondaryIndex::new(name.kind())))
                .collect(),
        }
    }
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self, name: IndexName) -> Option<&SecondaryIndex> {
        self.indexes.get(&name)
    }

    fn index_mut(&mut self, name: IndexName) -> &mut SecondaryIndex {
        self.indexes
            .entry(name)
            .or_insert_with(|| SecondaryIndex::new(name.kind()))
    }

    pub fn add(&mut self, name: IndexName, node: NodeId, key: &str, value: &str) {
        debug!("index add {} [{}={}] -> {}", name, key, value, node.index());
        self.index_mut(name).add(node, key, value);
    }

    pub fn remove_entry(&mut self, name: IndexName, node: NodeId, key: &str, value: &str) -> bool {
        self.index_mut(name).remove_entry(node, key, value)
    }

    pub fn remove_node(&mut self, name: IndexName, node: NodeId) -> usize {
        let removed = self.index_mut(name).remove_node(node);
        if removed > 0 {
            debug!("index remove {} <- {} ({} entries)", name, node.index(), removed);
        }
        removed
    }

    /// Looks up the single node for `(key, value)`.
    ///
    /// More than one hit means an identity invariant is broken, which is
    /// reported as corruption.
    pub fn query_unique(&self, name: IndexName, key: &str, value: &str) -> Result<Option<NodeId>> {
        let hits = self.query_multiple(name, key, value);
        match hits.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(*only)),
            many => Err(GraphError::Corruption(format!(
                "{} nodes in {} for {}={}",
                many.len(),
                name,
                key,
                value
            ))),
        }
    }

    pub fn query_multiple(&self, name: IndexName, key: &str, value: &str) -> Vec<NodeId> {
        self.index(name)
            .map(|index| index.query(key, value))
            .unwrap_or_default()
    }

    pub fn query_key(&self, name: IndexName, key: &str) -> Vec<NodeId> {
        self.index(name)
            .map(|index| index.query_key(key))
            .unwrap_or_default()
    }

    pub fn search(&self, name: IndexName, key: &str, query: &str) -> Vec<NodeId> {
        self.index(name)
            .map(|index| index.search(key, query))
            .unwrap_or_default()
    }

    pub fn entries_for(&self, name: IndexName, node: NodeId) -> Vec<(String, String)> {
        self.index(name)
            .map(|index| index.entries_for(node))
            .unwrap_or_default()
    }

    /// True if any index holds an entry for `node`.
    pub fn references(&self, node: NodeId) -> bool {
        self.indexes.values().any(|index| index.references(node))
    }
}

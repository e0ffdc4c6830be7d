//! Source documents: a study's curation properties plus its trees.

use crate::error::Result;
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parser output handed to the engine for import.
///
/// Upstream parsers occasionally emit `null` in place of a tree; those
/// slots are kept as `None` so the importer can report their positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Study-level curation properties (curator, publication, year, ...).
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,

    #[serde(default)]
    pub trees: Vec<Option<Tree>>,
}

impl SourceDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_tree(mut self, tree: impl Into<Tree>) -> Self {
        self.trees.push(Some(tree.into()));
        self
    }

    /// Appends an empty slot, as a faulty parser would.
    pub fn with_missing_tree(mut self) -> Self {
        self.trees.push(None);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON source document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let doc = Self::from_json_str(&text)?;
        debug!(
            "Read source document {} ({} tree slots)",
            path.display(),
            doc.trees.len()
        );
        Ok(doc)
    }

    /// Number of slots that hold an actual tree.
    pub fn present_tree_count(&self) -> usize {
        self.trees.iter().filter(|t| t.is_some()).count()
    }
}

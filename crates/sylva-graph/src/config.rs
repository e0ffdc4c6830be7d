//! Store configuration.
//!
//! Lives at `<project>/.sylva/config.json`. Missing fields fall back to
//! their defaults, so an older file keeps loading after new settings are
//! added.

use crate::error::Result;
use crate::node::Location;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding the configuration and the graph database.
pub const CONFIG_DIR: &str = ".sylva";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";

/// The remotes the engine may import from.
///
/// A registry is an immutable snapshot; adding a remote yields a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteRegistry {
    names: Vec<String>,
}

impl Default for RemoteRegistry {
    fn default() -> Self {
        Self::new(["remote"])
    }
}

impl RemoteRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if name != Location::LOCAL && !list.contains(&name) {
                list.push(name);
            }
        }
        Self { names: list }
    }

    /// A new snapshot that also knows `name`.
    pub fn with_remote(&self, name: impl Into<String>) -> Self {
        Self::new(self.names.iter().cloned().chain(std::iter::once(name.into())))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    /// True for the local location and for every registered remote.
    pub fn accepts(&self, location: &Location) -> bool {
        match location {
            Location::Local => true,
            Location::Remote(name) => self.contains(name),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.names.iter().map(|name| Location::Remote(name.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub version: String,
    /// Graph database directory, relative to the project root.
    pub data_dir: PathBuf,
    pub known_remotes: RemoteRegistry,
    /// Upper bound on nodes returned by one subtree fetch.
    pub max_subtree_nodes: usize,
    /// Ancestors shown above a fetched subtree.
    pub breadcrumb_depth: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            data_dir: PathBuf::from(CONFIG_DIR).join("graph"),
            known_remotes: RemoteRegistry::default(),
            max_subtree_nodes: 100,
            breadcrumb_depth: 5,
        }
    }
}

impl StoreConfig {
    pub fn config_path(project: &Path) -> PathBuf {
        project.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Loads the project configuration, or the defaults if none exists.
    pub fn load(project: &Path) -> Result<Self> {
        let path = Self::config_path(project);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, project: &Path) -> Result<()> {
        let path = Self::config_path(project);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Absolute location of the graph database for `project`.
    pub fn data_path(&self, project: &Path) -> PathBuf {
        project.join(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_registry_snapshots() {
        let base = RemoteRegistry::default();
        let extended = base.with_remote("treebase");
        assert!(!base.contains("treebase"));
        assert!(extended.contains("treebase"));
        assert!(extended.contains("remote"));
        assert_eq!(extended.with_remote("treebase"), extended);
        assert!(extended.accepts(&Location::Local));
        assert!(!extended.accepts(&Location::remote("dryad")));
    }

    #[test]
    fn test_local_is_never_a_remote() {
        let registry = RemoteRegistry::new(["local", "remote"]);
        assert_eq!(registry.names().to_vec(), vec!["remote".to_string()]);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"maxSubtreeNodes": 10}"#).unwrap();
        assert_eq!(config.max_subtree_nodes, 10);
        assert_eq!(config.breadcrumb_depth, 5);
        assert!(config.known_remotes.contains("remote"));
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let config = StoreConfig {
            known_remotes: RemoteRegistry::new(["treebase"]),
            ..StoreConfig::default()
        };
        config.save(dir.path()).unwrap();
        assert!(dir.path().join(".sylva/config.json").exists());
        assert_eq!(StoreConfig::load(dir.path()).unwrap(), config);
    }
}

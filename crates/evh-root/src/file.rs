//! A set of named trees loaded from one JSON input file.

use std::collections::BTreeMap;
use std::path::Path;

use evh_core::{EventSource, TreeProvider};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RootError};
use crate::tree::MemoryTree;

/// Trees keyed by name (`"Event."`, `"Run."`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryFile {
    /// Trees in this file.
    pub trees: BTreeMap<String, MemoryTree>,
}

impl MemoryFile {
    /// Read and validate a JSON input file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening input file");
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut file: MemoryFile = serde_json::from_str(text)?;
        for (name, tree) in file.trees.iter_mut() {
            tree.set_name(name.clone());
            tree.validate()?;
            tracing::debug!(tree = %name, entries = tree.entries, "tree loaded");
        }
        Ok(file)
    }

    /// Add (or replace) a tree.
    pub fn insert_tree(&mut self, name: impl Into<String>, mut tree: MemoryTree) {
        let name = name.into();
        tree.set_name(name.clone());
        self.trees.insert(name, tree);
    }

    /// Shared access to one tree.
    pub fn tree(&self, name: &str) -> Result<&MemoryTree> {
        self.trees.get(name).ok_or_else(|| RootError::TreeNotFound(name.to_string()))
    }
}

impl TreeProvider for MemoryFile {
    fn has_tree(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    fn tree_mut(&mut self, name: &str) -> evh_core::Result<&mut dyn EventSource> {
        match self.trees.get_mut(name) {
            Some(tree) => Ok(tree),
            None => Err(RootError::TreeNotFound(name.to_string()).into()),
        }
    }
}

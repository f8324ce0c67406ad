//! Build manifest: logical asset name → final emitted path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File name the manifest is emitted under.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Ordered map of logical asset names to emitted paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.entries.insert(name.into(), path.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    /// Point every entry currently mapped to `old` at `new`.
    pub fn rename_path(&mut self, old: &str, new: &str) {
        for path in self.entries.values_mut() {
            if path == old {
                *path = new.to_string();
            }
        }
    }

    /// Whether some entry maps to `path`.
    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        self.entries.values().any(|p| p == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty JSON, keys sorted.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".to_string())
    }
}

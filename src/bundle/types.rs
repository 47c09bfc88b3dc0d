use std::collections::hash_map::DefaultHasher;
use std::hash::{
    Hash,
    Hasher,
};
use std::path::PathBuf;

use thiserror::Error;

use crate::types::FlatTree;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    #[error("Bundle for locale '{locale}' is malformed, colliding keys: {}", .paths.join(", "))]
    Malformed { locale: String, paths: Vec<String> },

    #[error("No bundle found for locale '{locale}' in {}", .dir.display())]
    Missing { locale: String, dir: PathBuf },

    #[error("Failed to read bundle file {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Failed to parse bundle file {}: {message}", .path.display())]
    Syntax { path: PathBuf, message: String },

    #[error("Bundle file {} must contain a JSON object at the top level", .path.display())]
    NotAnObject { path: PathBuf },

    #[error("Failed to scan bundle directory {}: {message}", .dir.display())]
    Discovery { dir: PathBuf, message: String },
}

impl BundleError {
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Flattened bundle of one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatBundle {
    pub locale: String,
    /// Content fingerprint, changes whenever any key or value changes.
    pub version: String,
    pub entries: FlatTree,
    /// Source files, in load order.
    pub files: Vec<PathBuf>,
}

impl FlatBundle {
    #[must_use]
    pub fn new(locale: impl Into<String>, entries: FlatTree, files: Vec<PathBuf>) -> Self {
        let version = fingerprint(&entries);
        Self { locale: locale.into(), version, entries, files }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Hex digest of the flattened entries.
fn fingerprint(entries: &FlatTree) -> String {
    let mut hasher = DefaultHasher::new();
    entries.len().hash(&mut hasher);
    for (key, value) in entries {
        key.hash(&mut hasher);
        value.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

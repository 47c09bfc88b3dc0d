//! Flat key helpers: validation, namespaces and leaf/branch collision detection.

use std::collections::BTreeSet;
use std::ops::Bound;

use serde::Serialize;
use serde_json::{
    Map,
    Value,
};
use thiserror::Error;

use crate::types::FlatTree;

/// Reasons a flat key is rejected for writing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidKey {
    #[error("The key cannot be empty")]
    Empty,
    #[error("Key '{0}' contains an empty path segment")]
    EmptySegment(String),
    #[error("Key '{0}' has leading or trailing whitespace")]
    Whitespace(String),
}

/// Checks that `key` is a well-formed flat key for the given separator.
pub fn validate_key(key: &str, separator: &str) -> Result<(), InvalidKey> {
    if key.is_empty() {
        return Err(InvalidKey::Empty);
    }
    if key.trim() != key {
        return Err(InvalidKey::Whitespace(key.to_string()));
    }
    if key.split(separator).any(str::is_empty) {
        return Err(InvalidKey::EmptySegment(key.to_string()));
    }
    Ok(())
}

/// First path segment of a key (`"admin.users.title"` -> `"admin"`).
///
/// Keys without a separator are their own namespace.
#[must_use]
pub fn namespace_of<'a>(key: &'a str, separator: &str) -> &'a str {
    key.split(separator).next().unwrap_or(key)
}

/// Keys that occupy the same path as a leaf and as a branch, or that were
/// defined twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CollisionReport {
    /// Offending flat keys
    paths: BTreeSet<String>,
}

impl CollisionReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    pub fn extend(&mut self, other: Self) {
        self.paths.extend(other.paths);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    #[must_use]
    pub fn into_paths(self) -> Vec<String> {
        self.paths.into_iter().collect()
    }
}

/// Ordered set of flat keys answering "would this key collide?" queries.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    /// Indexed keys, ordered so that descendants of a key are contiguous
    keys: BTreeSet<String>,
    /// Key path separator
    separator: String,
}

impl KeyIndex {
    #[must_use]
    pub fn new(separator: &str) -> Self {
        Self { keys: BTreeSet::new(), separator: separator.to_string() }
    }

    pub fn insert(&mut self, key: impl Into<String>) {
        self.keys.insert(key.into());
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns an existing key that conflicts with `key`.
    ///
    /// A conflict is either an existing leaf on one of `key`'s ancestor paths,
    /// or an existing key nested below `key`. Equal keys do not conflict.
    #[must_use]
    pub fn conflict_for(&self, key: &str) -> Option<String> {
        for (index, _) in key.match_indices(self.separator.as_str()) {
            if let Some(ancestor) = key.get(..index)
                && self.keys.contains(ancestor)
            {
                return Some(ancestor.to_string());
            }
        }
        self.first_descendant(key).map(str::to_string)
    }

    /// Smallest key nested under `key`, if any.
    fn first_descendant(&self, key: &str) -> Option<&str> {
        let prefix = format!("{key}{}", self.separator);
        self.keys
            .range::<str, _>((Bound::Included(prefix.as_str()), Bound::Unbounded))
            .next()
            .filter(|candidate| candidate.starts_with(&prefix))
            .map(String::as_str)
    }

    /// Every key that is also used as a branch by another key.
    #[must_use]
    pub fn leaf_branch_collisions(&self) -> CollisionReport {
        let mut report = CollisionReport::new();
        for key in &self.keys {
            if self.first_descendant(key).is_some() {
                report.insert(key.clone());
            }
        }
        report
    }
}

impl<S: Into<String>> Extend<S> for KeyIndex {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        self.keys.extend(iter.into_iter().map(Into::into));
    }
}

/// Leaf/branch collisions among `keys`.
pub fn find_leaf_branch_collisions<I, S>(keys: I, separator: &str) -> CollisionReport
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut index = KeyIndex::new(separator);
    index.extend(keys);
    index.leaf_branch_collisions()
}

/// Rebuilds the nested JSON form of a flat tree.
///
/// Keys that would need a leaf to act as an object are skipped with a warning;
/// validated trees never contain them.
#[must_use]
pub fn to_nested(tree: &FlatTree, separator: &str) -> Value {
    let mut root = Map::new();

    'keys: for (key, value) in tree {
        let mut segments: Vec<&str> = key.split(separator).collect();
        let Some(leaf) = segments.pop() else {
            continue;
        };

        let mut current = &mut root;
        for segment in segments {
            let next = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            let Value::Object(map) = next else {
                tracing::warn!(key = %key, "Skipping key nested under a leaf value");
                continue 'keys;
            };
            current = map;
        }

        if current.get(leaf).is_some_and(Value::is_object) {
            tracing::warn!(key = %key, "Skipping leaf that shadows a nested object");
            continue;
        }
        current.insert(leaf.to_string(), Value::String(value.clone()));
    }

    Value::Object(root)
}

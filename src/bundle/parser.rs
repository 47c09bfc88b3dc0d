//! Strict bundle parser.
//!
//! Walks the JSON syntax tree instead of a deserialized map so that duplicate
//! sibling keys are seen (a map keeps only the last one).

use std::collections::HashSet;

use jsonc_parser::ast::{
    Object,
    ObjectPropName,
    Value,
};
use jsonc_parser::{
    CollectOptions,
    ParseOptions,
};

use crate::keys::{
    CollisionReport,
    find_leaf_branch_collisions,
};
use crate::types::FlatTree;

/// Flattened content of one bundle file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBundle {
    pub entries: FlatTree,
    /// Duplicate siblings, duplicate flat keys and leaf/branch collisions.
    pub collisions: CollisionReport,
}

/// Why a bundle file could not be flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    Syntax(String),
    NotAnObject,
}

/// Parses and flattens one bundle file.
///
/// `namespace` is prepended as the first path segment (namespace-per-file
/// layouts). An empty document flattens to an empty tree.
pub fn parse_bundle_text(
    text: &str,
    separator: &str,
    namespace: Option<&str>,
) -> Result<ParsedBundle, ParseFailure> {
    let parsed =
        jsonc_parser::parse_to_ast(text, &CollectOptions::default(), &ParseOptions::default())
            .map_err(|e| ParseFailure::Syntax(e.to_string()))?;

    let mut flattener =
        Flattener { separator, entries: FlatTree::new(), collisions: CollisionReport::new() };

    match parsed.value {
        None => {}
        Some(Value::Object(object)) => flattener.object(&object, namespace),
        Some(_) => return Err(ParseFailure::NotAnObject),
    }

    let Flattener { entries, mut collisions, .. } = flattener;
    collisions.extend(find_leaf_branch_collisions(entries.keys(), separator));

    Ok(ParsedBundle { entries, collisions })
}

/// Depth-first flattening state.
struct Flattener<'s> {
    /// Key path separator
    separator: &'s str,
    /// Leaves collected so far
    entries: FlatTree,
    /// Paths seen more than once
    collisions: CollisionReport,
}

impl Flattener<'_> {
    /// Flattens the properties of `object` below `prefix`.
    fn object(&mut self, object: &Object<'_>, prefix: Option<&str>) {
        let mut siblings = HashSet::new();

        for property in &object.properties {
            let name = property_name(&property.name);
            let key =
                prefix.map_or_else(|| name.to_string(), |p| format!("{p}{}{name}", self.separator));

            if !siblings.insert(name) {
                self.collisions.insert(key.clone());
            }
            self.value(&property.value, &key);
        }
    }

    /// Flattens a single value found at `key`.
    fn value(&mut self, value: &Value<'_>, key: &str) {
        match value {
            Value::Object(object) => self.object(object, Some(key)),
            Value::Array(array) => {
                for (index, element) in array.elements.iter().enumerate() {
                    self.value(element, &format!("{key}[{index}]"));
                }
            }
            Value::StringLit(lit) => self.leaf(key, lit.value.to_string()),
            Value::NumberLit(lit) => self.leaf(key, lit.value.to_string()),
            Value::BooleanLit(lit) => self.leaf(key, lit.value.to_string()),
            Value::NullKeyword(_) => self.leaf(key, "null".to_string()),
        }
    }

    /// Records a leaf; a flat key produced twice is a collision.
    fn leaf(&mut self, key: &str, value: String) {
        if self.entries.insert(key.to_string(), value).is_some() {
            self.collisions.insert(key);
        }
    }
}

/// Unquoted property name.
fn property_name<'a>(name: &'a ObjectPropName<'_>) -> &'a str {
    match name {
        ObjectPropName::String(lit) => lit.value.as_ref(),
        ObjectPropName::Word(word) => word.value,
    }
}

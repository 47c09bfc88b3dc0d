//! Read-only views over the tiers: per-key provenance, namespace counts and
//! filtered listings.

use std::collections::BTreeMap;

use serde::{
    Deserialize,
    Serialize,
};

use crate::keys::namespace_of;
use crate::overrides::OverrideRecord;
use crate::resolver::{
    ResolveInputs,
    ResolvedTree,
    lookup,
};
use crate::types::{
    Scope,
    Tier,
};

/// Provenance of one key across every tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub key: String,
    pub locale: String,
    pub scope: Scope,
    pub bundle_value: Option<String>,
    pub default_bundle_value: Option<String>,
    /// Stored GLOBAL record, deleted or empty ones included
    pub global_override: Option<OverrideRecord>,
    /// Stored record of the requested tenant
    pub tenant_override: Option<OverrideRecord>,
    pub active_value: Option<String>,
    pub active_tier: Option<Tier>,
    /// Whether a cache entry exists for (locale, scope)
    pub cached: bool,
    /// Every stored record of the key, all locales and scopes
    pub rows: Vec<OverrideRecord>,
}

/// Builds the provenance report of `key`.
///
/// `inputs` must be the inputs a resolve of (locale, scope) would use and
/// `rows` every stored record of `key`.
#[must_use]
pub fn debug_report(
    key: &str,
    locale: &str,
    scope: &Scope,
    inputs: &ResolveInputs<'_>,
    rows: Vec<OverrideRecord>,
    cached: bool,
) -> DebugReport {
    let stored = |s: &Scope| rows.iter().find(|r| r.locale == locale && r.scope == *s && r.key == key).cloned();
    let global_override = stored(&Scope::Global);
    let tenant_override = if scope.is_global() { None } else { stored(scope) };
    let active = lookup(key, inputs);

    DebugReport {
        key: key.to_string(),
        locale: locale.to_string(),
        scope: scope.clone(),
        bundle_value: inputs.locale_bundle.and_then(|b| b.get(key)).cloned(),
        default_bundle_value: inputs.default_bundle.get(key).cloned(),
        global_override,
        tenant_override,
        active_tier: active.as_ref().map(|a| a.tier),
        active_value: active.map(|a| a.value),
        cached,
        rows,
    }
}

/// Key count per namespace (first path segment).
///
/// The counts always add up to the size of the tree.
#[must_use]
pub fn namespace_stats(tree: &ResolvedTree, separator: &str) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    for key in tree.keys() {
        *stats.entry(namespace_of(key, separator).to_string()).or_insert(0) += 1;
    }
    stats
}

/// Filters of `list_entries`. Empty filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryFilter {
    /// First path segment
    pub namespace: Option<String>,
    /// Case-insensitive substring of the key or the value
    pub search: Option<String>,
}

/// One listed leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRow {
    pub key: String,
    pub value: String,
    pub tier: Tier,
}

/// Resolved leaves matching `filter`, sorted by key.
#[must_use]
pub fn list_entries(tree: &ResolvedTree, filter: &EntryFilter, separator: &str) -> Vec<EntryRow> {
    let needle = filter.search.as_deref().map(str::to_lowercase).filter(|s| !s.is_empty());

    tree.iter()
        .filter(|(key, _)| {
            filter.namespace.as_deref().is_none_or(|ns| namespace_of(key, separator) == ns)
        })
        .filter(|(key, resolved)| {
            needle.as_deref().is_none_or(|needle| {
                key.to_lowercase().contains(needle) || resolved.value.to_lowercase().contains(needle)
            })
        })
        .map(|(key, resolved)| EntryRow {
            key: key.to_string(),
            value: resolved.value.clone(),
            tier: resolved.tier,
        })
        .collect()
}

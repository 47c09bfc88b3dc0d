//! Tier merge.
//!
//! Precedence, highest first: tenant override, GLOBAL override, locale
//! bundle, default-locale bundle. Pure; callers gather the inputs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::overrides::OverrideRecord;
use crate::types::{
    FlatTree,
    Tier,
};

/// One resolved leaf and the tier it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedValue {
    pub value: String,
    pub tier: Tier,
}

/// Merged flat tree of one (locale, scope).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedTree {
    /// Leaves by flat key
    entries: BTreeMap<String, ResolvedValue>,
}

impl ResolvedTree {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ResolvedValue> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.value.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Values only, as stored in the cache.
    #[must_use]
    pub fn to_flat(&self) -> FlatTree {
        self.entries.iter().map(|(k, v)| (k.clone(), v.value.clone())).collect()
    }

    /// Sets `key` unless a higher tier already holds it.
    fn layer(&mut self, key: &str, value: &str, tier: Tier) {
        match self.entries.get_mut(key) {
            Some(existing) if existing.tier < tier => {}
            Some(existing) => {
                existing.value = value.to_string();
                existing.tier = tier;
            }
            None => {
                self.entries.insert(key.to_string(), ResolvedValue { value: value.to_string(), tier });
            }
        }
    }
}

/// Everything one merge reads.
#[derive(Debug, Clone, Copy)]
pub struct ResolveInputs<'a> {
    /// Bundle of the requested locale; `None` when it has no bundle of its own
    pub locale_bundle: Option<&'a FlatTree>,
    pub default_bundle: &'a FlatTree,
    pub global_overrides: &'a [OverrideRecord],
    /// Empty when resolving GLOBAL
    pub tenant_overrides: &'a [OverrideRecord],
}

/// Merges every tier into one tree.
///
/// Deleted and empty overrides are absent at their tier.
#[must_use]
pub fn resolve(inputs: &ResolveInputs<'_>) -> ResolvedTree {
    let mut tree = ResolvedTree::default();

    for (key, value) in inputs.default_bundle {
        tree.layer(key, value, Tier::DefaultLocaleBundle);
    }
    if let Some(bundle) = inputs.locale_bundle {
        for (key, value) in bundle {
            tree.layer(key, value, Tier::LocaleBundle);
        }
    }
    for record in inputs.global_overrides.iter().filter(|r| r.is_effective()) {
        tree.layer(&record.key, &record.value, Tier::GlobalOverride);
    }
    for record in inputs.tenant_overrides.iter().filter(|r| r.is_effective()) {
        tree.layer(&record.key, &record.value, Tier::TenantOverride);
    }

    tree
}

/// Resolves a single key without building the whole tree.
#[must_use]
pub fn lookup(key: &str, inputs: &ResolveInputs<'_>) -> Option<ResolvedValue> {
    let effective = |records: &[OverrideRecord]| {
        records.iter().find(|r| r.key == key && r.is_effective()).map(|r| r.value.clone())
    };

    if let Some(value) = effective(inputs.tenant_overrides) {
        return Some(ResolvedValue { value, tier: Tier::TenantOverride });
    }
    if let Some(value) = effective(inputs.global_overrides) {
        return Some(ResolvedValue { value, tier: Tier::GlobalOverride });
    }
    if let Some(value) = inputs.locale_bundle.and_then(|b| b.get(key)) {
        return Some(ResolvedValue { value: value.clone(), tier: Tier::LocaleBundle });
    }
    inputs
        .default_bundle
        .get(key)
        .map(|value| ResolvedValue { value: value.clone(), tier: Tier::DefaultLocaleBundle })
}

//! In-memory record table.

use std::collections::BTreeMap;

use chrono::{
    DateTime,
    Utc,
};

use super::types::{
    OverrideFilter,
    OverrideOrigin,
    OverrideRecord,
    OverrideWrite,
    WriteMode,
    WriteOutcome,
};
use crate::types::Scope;

/// Record identity: (locale, scope, key).
type RecordId = (String, Scope, String);

/// Override records keyed by (locale, scope, key).
///
/// Ordered so that scans return records sorted by locale, scope and key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideTable {
    /// Every record, deleted ones included
    records: BTreeMap<RecordId, OverrideRecord>,
}

impl OverrideTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from stored records; later duplicates win.
    pub fn from_records(records: impl IntoIterator<Item = OverrideRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| ((r.locale.clone(), r.scope.clone(), r.key.clone()), r))
            .collect();
        Self { records }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &OverrideRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn get(&self, locale: &str, scope: &Scope, key: &str) -> Option<&OverrideRecord> {
        self.records.get(&(locale.to_string(), scope.clone(), key.to_string()))
    }

    /// Applies one write according to its mode.
    pub fn apply(&mut self, write: &OverrideWrite, now: DateTime<Utc>) -> WriteOutcome {
        let id = (write.locale.clone(), write.scope.clone(), write.key.clone());

        let Some(existing) = self.records.get_mut(&id) else {
            self.records.insert(
                id,
                OverrideRecord {
                    locale: write.locale.clone(),
                    scope: write.scope.clone(),
                    key: write.key.clone(),
                    value: write.value.clone(),
                    origin: write.origin,
                    deleted: false,
                    updated_at: now,
                    updated_by: write.actor.clone(),
                },
            );
            return WriteOutcome::Inserted;
        };

        match write.mode {
            WriteMode::InsertIfAbsent => WriteOutcome::Skipped,
            WriteMode::RefreshSeed => {
                if existing.deleted || existing.origin != OverrideOrigin::Seed {
                    WriteOutcome::Skipped
                } else if existing.value == write.value {
                    WriteOutcome::Unchanged
                } else {
                    existing.value.clone_from(&write.value);
                    existing.updated_at = now;
                    existing.updated_by.clone_from(&write.actor);
                    WriteOutcome::Updated
                }
            }
            WriteMode::Upsert => {
                if !existing.deleted
                    && existing.value == write.value
                    && existing.origin == write.origin
                {
                    return WriteOutcome::Unchanged;
                }
                existing.value.clone_from(&write.value);
                existing.origin = write.origin;
                existing.deleted = false;
                existing.updated_at = now;
                existing.updated_by.clone_from(&write.actor);
                WriteOutcome::Updated
            }
        }
    }

    /// Marks a record deleted. Missing records are `Skipped`.
    pub fn mark_deleted(
        &mut self,
        locale: &str,
        scope: &Scope,
        key: &str,
        actor: &str,
        now: DateTime<Utc>,
    ) -> WriteOutcome {
        let id = (locale.to_string(), scope.clone(), key.to_string());
        match self.records.get_mut(&id) {
            None => WriteOutcome::Skipped,
            Some(existing) if existing.deleted => WriteOutcome::Unchanged,
            Some(existing) => {
                existing.deleted = true;
                existing.updated_at = now;
                existing.updated_by = actor.to_string();
                WriteOutcome::Updated
            }
        }
    }

    #[must_use]
    pub fn find(&self, filter: &OverrideFilter) -> Vec<OverrideRecord> {
        self.records.values().filter(|r| filter.matches(r)).cloned().collect()
    }

    /// Every record of `key` across locales and scopes, deleted ones included.
    #[must_use]
    pub fn debug_rows(&self, key: &str) -> Vec<OverrideRecord> {
        self.records.values().filter(|r| r.key == key).cloned().collect()
    }

    /// Whether any record is owned by `scope`.
    #[must_use]
    pub fn has_scope(&self, scope: &Scope) -> bool {
        self.records.keys().any(|(_, s, _)| s == scope)
    }
}

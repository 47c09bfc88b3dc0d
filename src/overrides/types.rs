use std::path::PathBuf;
use std::time::Duration;

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

use crate::types::Scope;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Override store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to persist overrides to {}: {message}", .path.display())]
    Persist { path: PathBuf, message: String },

    #[error("Failed to load overrides from {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("Override store is unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the write may still land after this error was returned.
    ///
    /// A timed-out call only stops waiting; the store keeps going.
    #[must_use]
    pub const fn outcome_unknown(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Who produced an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverrideOrigin {
    /// Written by an administrator.
    #[default]
    Manual,
    /// Copied from the bundle by seeding; refreshed by resync.
    Seed,
    /// Produced by the text generator.
    AutoFill,
}

/// One persisted override with its audit metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRecord {
    pub locale: String,
    pub scope: Scope,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub origin: OverrideOrigin,
    /// Logically deleted records stay in the store for auditing.
    #[serde(default)]
    pub deleted: bool,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl OverrideRecord {
    /// Whether the record takes part in resolution.
    ///
    /// Empty values and deleted records are absent at their tier.
    #[must_use]
    pub fn is_effective(&self) -> bool {
        !self.deleted && !self.value.is_empty()
    }
}

/// How a write treats an existing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Insert or replace.
    #[default]
    Upsert,
    /// Insert only when no record exists, deleted ones included.
    InsertIfAbsent,
    /// Insert when absent, otherwise update only live `Seed` records.
    RefreshSeed,
}

/// A single requested write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideWrite {
    pub locale: String,
    pub scope: Scope,
    pub key: String,
    pub value: String,
    pub actor: String,
    pub origin: OverrideOrigin,
    pub mode: WriteMode,
}

impl OverrideWrite {
    /// Administrator write.
    #[must_use]
    pub fn manual(
        locale: impl Into<String>,
        scope: Scope,
        key: impl Into<String>,
        value: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            locale: locale.into(),
            scope,
            key: key.into(),
            value: value.into(),
            actor: actor.into(),
            origin: OverrideOrigin::Manual,
            mode: WriteMode::Upsert,
        }
    }

    /// Bundle value copied into the store by a sync run.
    #[must_use]
    pub fn seed(
        locale: impl Into<String>,
        scope: Scope,
        key: impl Into<String>,
        value: impl Into<String>,
        mode: WriteMode,
    ) -> Self {
        Self {
            locale: locale.into(),
            scope,
            key: key.into(),
            value: value.into(),
            actor: "sync".to_string(),
            origin: OverrideOrigin::Seed,
            mode,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: OverrideOrigin) -> Self {
        self.origin = origin;
        self
    }
}

/// Result of applying one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteOutcome {
    Inserted,
    Updated,
    /// The record already held the requested state.
    Unchanged,
    /// Left alone because of the write mode.
    Skipped,
}

impl WriteOutcome {
    /// Whether the write changed stored state (and caches must be invalidated).
    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(self, Self::Inserted | Self::Updated)
    }
}

/// Selection for `find_all`. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideFilter {
    pub locale: Option<String>,
    pub scope: Option<Scope>,
    pub key: Option<String>,
    pub include_deleted: bool,
}

impl OverrideFilter {
    /// Live records of one (locale, scope).
    #[must_use]
    pub fn for_scope(locale: impl Into<String>, scope: Scope) -> Self {
        Self { locale: Some(locale.into()), scope: Some(scope), ..Self::default() }
    }

    #[must_use]
    pub fn matches(&self, record: &OverrideRecord) -> bool {
        (self.include_deleted || !record.deleted)
            && self.locale.as_ref().is_none_or(|locale| *locale == record.locale)
            && self.scope.as_ref().is_none_or(|scope| *scope == record.scope)
            && self.key.as_ref().is_none_or(|key| *key == record.key)
    }
}

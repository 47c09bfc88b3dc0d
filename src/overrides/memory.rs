//! In-process override store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::store::OverrideStore;
use super::table::OverrideTable;
use super::types::{
    OverrideFilter,
    OverrideRecord,
    OverrideWrite,
    StoreError,
    WriteOutcome,
};
use crate::types::Scope;

/// Volatile store, used for tests and single-process deployments without
/// persistence.
#[derive(Debug, Default)]
pub struct MemoryOverrideStore {
    /// Records
    table: RwLock<OverrideTable>,
}

impl MemoryOverrideStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = OverrideRecord>) -> Self {
        Self { table: RwLock::new(OverrideTable::from_records(records)) }
    }
}

#[async_trait]
impl OverrideStore for MemoryOverrideStore {
    async fn upsert(&self, write: OverrideWrite) -> Result<WriteOutcome, StoreError> {
        Ok(self.table.write().await.apply(&write, Utc::now()))
    }

    async fn bulk_upsert(
        &self,
        writes: Vec<OverrideWrite>,
    ) -> Vec<Result<WriteOutcome, StoreError>> {
        let mut table = self.table.write().await;
        let now = Utc::now();
        writes.iter().map(|write| Ok(table.apply(write, now))).collect()
    }

    async fn mark_deleted(
        &self,
        locale: &str,
        scope: &Scope,
        key: &str,
        actor: &str,
    ) -> Result<WriteOutcome, StoreError> {
        Ok(self.table.write().await.mark_deleted(locale, scope, key, actor, Utc::now()))
    }

    async fn find_all(&self, filter: &OverrideFilter) -> Result<Vec<OverrideRecord>, StoreError> {
        Ok(self.table.read().await.find(filter))
    }

    async fn debug_rows(&self, key: &str) -> Result<Vec<OverrideRecord>, StoreError> {
        Ok(self.table.read().await.debug_rows(key))
    }

    async fn has_scope(&self, scope: &Scope) -> Result<bool, StoreError> {
        Ok(self.table.read().await.has_scope(scope))
    }
}

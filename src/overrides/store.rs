//! Override store trait and the timeout wrapper around it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{
    OverrideFilter,
    OverrideRecord,
    OverrideWrite,
    StoreError,
    WriteOutcome,
};
use crate::types::Scope;

/// Persistence backend for overrides.
///
/// Writes to the same record are serialized by the store (last write wins).
/// Each write is all-or-nothing.
#[async_trait]
pub trait OverrideStore: Send + Sync + fmt::Debug {
    async fn upsert(&self, write: OverrideWrite) -> Result<WriteOutcome, StoreError>;

    /// Applies every write and reports one result per entry, in order.
    async fn bulk_upsert(
        &self,
        writes: Vec<OverrideWrite>,
    ) -> Vec<Result<WriteOutcome, StoreError>> {
        let mut results = Vec::with_capacity(writes.len());
        for write in writes {
            results.push(self.upsert(write).await);
        }
        results
    }

    /// Logical delete. The record stays for auditing.
    async fn mark_deleted(
        &self,
        locale: &str,
        scope: &Scope,
        key: &str,
        actor: &str,
    ) -> Result<WriteOutcome, StoreError>;

    async fn find_all(&self, filter: &OverrideFilter) -> Result<Vec<OverrideRecord>, StoreError>;

    /// Every record of `key`, all locales and scopes, deleted ones included.
    async fn debug_rows(&self, key: &str) -> Result<Vec<OverrideRecord>, StoreError>;

    /// Whether `scope` owns at least one record.
    async fn has_scope(&self, scope: &Scope) -> Result<bool, StoreError>;

    /// Makes every acknowledged write durable.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Waits, without any time bound, until writes whose caller already gave
    /// up have landed or failed.
    async fn settle(&self) -> Result<(), StoreError> {
        self.flush().await
    }
}

/// Bounds every call of the wrapped store by a timeout.
#[derive(Debug, Clone)]
pub struct TimeoutOverrideStore {
    /// Wrapped store
    inner: Arc<dyn OverrideStore>,
    /// Upper bound per call
    timeout: Duration,
}

impl TimeoutOverrideStore {
    #[must_use]
    pub fn new(inner: Arc<dyn OverrideStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Runs `call`, failing with `StoreError::Timeout` once the bound elapses.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.timeout, call).await.unwrap_or_else(|_| {
            tracing::warn!(operation, timeout = ?self.timeout, "Override store call timed out");
            Err(StoreError::Timeout(self.timeout))
        })
    }
}

#[async_trait]
impl OverrideStore for TimeoutOverrideStore {
    async fn upsert(&self, write: OverrideWrite) -> Result<WriteOutcome, StoreError> {
        self.bounded("upsert", self.inner.upsert(write)).await
    }

    async fn bulk_upsert(
        &self,
        writes: Vec<OverrideWrite>,
    ) -> Vec<Result<WriteOutcome, StoreError>> {
        let count = writes.len();
        match tokio::time::timeout(self.timeout, self.inner.bulk_upsert(writes)).await {
            Ok(results) => results,
            Err(_) => {
                tracing::warn!(count, timeout = ?self.timeout, "Override store bulk write timed out");
                vec![Err(StoreError::Timeout(self.timeout)); count]
            }
        }
    }

    async fn mark_deleted(
        &self,
        locale: &str,
        scope: &Scope,
        key: &str,
        actor: &str,
    ) -> Result<WriteOutcome, StoreError> {
        self.bounded("mark_deleted", self.inner.mark_deleted(locale, scope, key, actor)).await
    }

    async fn find_all(&self, filter: &OverrideFilter) -> Result<Vec<OverrideRecord>, StoreError> {
        self.bounded("find_all", self.inner.find_all(filter)).await
    }

    async fn debug_rows(&self, key: &str) -> Result<Vec<OverrideRecord>, StoreError> {
        self.bounded("debug_rows", self.inner.debug_rows(key)).await
    }

    async fn has_scope(&self, scope: &Scope) -> Result<bool, StoreError> {
        self.bounded("has_scope", self.inner.has_scope(scope)).await
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.bounded("flush", self.inner.flush()).await
    }

    async fn settle(&self) -> Result<(), StoreError> {
        self.inner.settle().await
    }
}

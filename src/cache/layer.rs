//! Fail-open cache layer.
//!
//! Every backend call is bounded by a timeout; failures and timeouts are
//! logged and treated as a miss (reads) or a no-op (writes, invalidations).

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{
    AtomicU64,
    Ordering,
};
use std::time::Duration;

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::backend::{
    CacheBackend,
    CacheError,
};
use crate::overrides::OverrideStore;
use crate::types::{
    FlatTree,
    Scope,
};

/// Cache key of a resolved tree.
#[must_use]
pub fn cache_key(locale: &str, scope: &Scope) -> String {
    format!("i18n:{locale}:{scope}")
}

/// Prefix shared by every scope of `locale`.
#[must_use]
pub fn locale_prefix(locale: &str) -> String {
    format!("i18n:{locale}:")
}

/// Serialized cache payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub tree: FlatTree,
    pub inserted_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct CacheLayer {
    /// Storage
    backend: Arc<dyn CacheBackend>,
    /// Default entry lifetime
    ttl: Duration,
    /// Upper bound per backend call
    timeout: Duration,
    /// Bumped by every invalidation; a tree computed under an older
    /// generation is not stored
    generation: AtomicU64,
}

impl CacheLayer {
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration, timeout: Duration) -> Self {
        Self { backend, ttl, timeout, generation: AtomicU64::new(0) }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current invalidation generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Bounds a backend call by the configured timeout.
    async fn call<T>(
        &self,
        call: impl Future<Output = Result<T, CacheError>> + Send,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or_else(|_| Err(CacheError::Timeout(self.timeout)))
    }

    /// Cached tree of (locale, scope). Any failure is a miss.
    pub async fn get(&self, locale: &str, scope: &Scope) -> Option<FlatTree> {
        let key = cache_key(locale, scope);
        let payload = match self.call(self.backend.get(&key)).await {
            Ok(payload) => payload?,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&payload) {
            Ok(entry) => {
                tracing::debug!(key = %key, "Cache hit");
                Some(entry.tree)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                if let Err(e) = self.call(self.backend.delete(&key)).await {
                    tracing::warn!(key = %key, error = %e, "Cache delete failed");
                }
                None
            }
        }
    }

    /// Whether (locale, scope) currently has a readable entry.
    pub async fn contains(&self, locale: &str, scope: &Scope) -> bool {
        self.get(locale, scope).await.is_some()
    }

    /// Stores a tree with the default TTL.
    pub async fn set(&self, locale: &str, scope: &Scope, tree: &FlatTree) {
        self.set_with_ttl(locale, scope, tree, self.ttl).await;
    }

    pub async fn set_with_ttl(&self, locale: &str, scope: &Scope, tree: &FlatTree, ttl: Duration) {
        let key = cache_key(locale, scope);
        let entry = CacheEntry { tree: tree.clone(), inserted_at: Utc::now() };

        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self.call(self.backend.set(&key, payload, ttl)).await {
            tracing::warn!(key = %key, error = %e, "Cache write failed, continuing without cache");
        }
    }

    /// Stores a tree unless an invalidation happened since `generation` was
    /// observed. Returns whether the tree was stored.
    pub async fn set_if_current(
        &self,
        locale: &str,
        scope: &Scope,
        tree: &FlatTree,
        generation: u64,
    ) -> bool {
        if self.generation() != generation {
            tracing::debug!(locale = %locale, scope = %scope, "Skipping cache write of a stale tree");
            return false;
        }
        self.set(locale, scope, tree).await;

        // 書き込み中に無効化が入った場合は取り消す
        if self.generation() != generation {
            tracing::debug!(locale = %locale, scope = %scope, "Invalidated while storing, dropping the entry");
            let key = cache_key(locale, scope);
            if let Err(e) = self.call(self.backend.delete(&key)).await {
                tracing::warn!(key = %key, error = %e, "Cache delete failed");
            }
            return false;
        }
        true
    }

    pub async fn invalidate(&self, locale: &str, scope: &Scope) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let key = cache_key(locale, scope);
        match self.call(self.backend.delete(&key)).await {
            Ok(()) => tracing::debug!(key = %key, "Cache entry invalidated"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache invalidation failed"),
        }
    }

    /// Invalidates every scope of `locale`.
    pub async fn invalidate_locale(&self, locale: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let prefix = locale_prefix(locale);
        match self.call(self.backend.delete_prefix(&prefix)).await {
            Ok(removed) => tracing::debug!(locale = %locale, removed, "Locale cache invalidated"),
            Err(e) => tracing::warn!(locale = %locale, error = %e, "Locale cache invalidation failed"),
        }
    }

    pub async fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.call(self.backend.clear()).await {
            Ok(()) => tracing::debug!("Cache cleared"),
            Err(e) => tracing::warn!(error = %e, "Cache clear failed"),
        }
    }

    /// Invalidates what a write to (locale, scope) can affect.
    ///
    /// GLOBAL writes reach every tenant of the locale, tenant writes only
    /// their own entry.
    pub async fn invalidate_after_write(&self, locale: &str, scope: &Scope) {
        if scope.is_global() {
            self.invalidate_locale(locale).await;
        } else {
            self.invalidate(locale, scope).await;
        }
    }

    /// Invalidates after a write whose outcome is unknown (timed out).
    ///
    /// Invalidates now and once more after `store` has settled, so a write
    /// landing late cannot leave a tree composed before it in the cache.
    pub async fn invalidate_after_unsettled_write(
        self: &Arc<Self>,
        store: &Arc<dyn OverrideStore>,
        locale: &str,
        scope: &Scope,
    ) {
        self.invalidate_after_write(locale, scope).await;

        let cache = Arc::clone(self);
        let store = Arc::clone(store);
        let (locale, scope) = (locale.to_string(), scope.clone());
        tokio::spawn(async move {
            if let Err(e) = store.settle().await {
                tracing::warn!(locale = %locale, scope = %scope, error = %e, "Override store did not settle");
            }
            cache.invalidate_after_write(&locale, &scope).await;
            tracing::debug!(locale = %locale, scope = %scope, "Invalidated after a late write settled");
        });
    }
}

//! Cache backend abstraction.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend is unavailable: {0}")]
    Unavailable(String),

    #[error("Cache call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cached payload is invalid: {0}")]
    InvalidPayload(String),
}

/// String key/value store with TTL and deletion (Redis-like).
#[async_trait]
pub trait CacheBackend: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Deletes every key starting with `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}

/// Value stored by [`MemoryCache`].
#[derive(Debug, Clone)]
struct Slot {
    /// Serialized payload
    value: String,
    /// Expiry deadline
    expires_at: Instant,
}

/// In-process backend. Expired entries are dropped lazily.
#[derive(Debug, Default)]
pub struct MemoryCache {
    /// Entries by key
    slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let slots = self.slots.read().await;
        Ok(slots
            .get(key)
            .filter(|slot| slot.expires_at > Instant::now())
            .map(|slot| slot.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        slots.retain(|_, slot| slot.expires_at > now);
        slots.insert(key.to_string(), Slot { value, expires_at: now + ttl });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.slots.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|key, _| !key.starts_with(prefix));
        Ok(before - slots.len())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.slots.write().await.clear();
        Ok(())
    }
}

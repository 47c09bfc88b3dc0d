//! Read-through cache of resolved trees keyed by (locale, scope).

/// Cache backend trait and the in-process backend
mod backend;
/// Fail-open cache layer used by the engine
mod layer;

pub use backend::{
    CacheBackend,
    CacheError,
    MemoryCache,
};
pub use layer::{
    CacheEntry,
    CacheLayer,
    cache_key,
    locale_prefix,
};

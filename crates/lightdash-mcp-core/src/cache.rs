//! In-memory TTL cache for expensive aggregate lookups.
//!
//! The cache is an explicit service object: construct one and hand it (behind
//! an `Arc`) to whoever needs it. Every entry carries its own TTL; an entry is
//! returned only while `now - inserted_at < ttl`.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    data: V,
    ttl: Duration,
}

/// Expires each entry after its own TTL, restarted on overwrite.
struct PerEntryTtl;

impl<V> Expiry<String, CacheEntry<V>> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// String-keyed cache whose entries expire after a per-entry TTL.
pub struct TtlCache<V> {
    entries: Cache<String, CacheEntry<V>>,
    default_ttl: Duration,
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.entries.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    /// Create an empty cache. `default_ttl` is used by
    /// [`get_or_try_insert_with`](Self::get_or_try_insert_with).
    pub fn new(default_ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(10_000)
            .expire_after(PerEntryTtl)
            .build();
        Self {
            entries,
            default_ttl,
        }
    }

    /// TTL applied when callers don't pass one.
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stored value for `key`, if it has not expired.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).await.map(|entry| entry.data)
    }

    /// Store `value` under `key`, replacing any previous entry and restarting its TTL.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries
            .insert(key.into(), CacheEntry { data: value, ttl })
            .await;
    }

    /// Remove `key` regardless of freshness.
    pub async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    /// Evict expired entries now instead of lazily.
    pub async fn purge_expired(&self) {
        self.entries.run_pending_tasks().await;
    }

    /// Number of stored entries.
    ///
    /// Eventually consistent; call [`purge_expired`](Self::purge_expired)
    /// first for an exact count.
    pub fn len(&self) -> usize {
        usize::try_from(self.entries.entry_count()).unwrap_or(usize::MAX)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    /// Return the cached value or compute, store, and return a new one.
    ///
    /// Errors from `compute` are returned and nothing is stored. Concurrent
    /// misses for the same key share a single computation.
    pub async fn get_or_try_insert_with<E, F, Fut>(&self, key: &str, compute: F) -> Result<V, E>
    where
        E: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let ttl = self.default_ttl;
        let mut computed = false;
        let init = async {
            computed = true;
            compute().await.map(|data| CacheEntry { data, ttl })
        };
        let result = self.entries.try_get_with(key.to_string(), init).await;
        tracing::debug!(key, hit = !computed, "cache lookup");
        result.map(|entry| entry.data).map_err(Arc::unwrap_or_clone)
    }
}

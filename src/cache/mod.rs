//! Time-to-live cache used to memoize task queries.
//!
//! The cache is generic over its physical substrate ([`CacheBackend`]):
//! - [`KeyValueCacheBackend`] stores entries in the key-value store
//! - [`SqliteCacheBackend`] stores entries in a table of the task database
//!
//! Cached data is never authoritative. Any entry may disappear at any time;
//! the worst case is one extra read from the task store.

mod backends;
mod clock;
mod tasks;

pub use backends::{KeyValueCacheBackend, SqliteCacheBackend, CACHE_KEY_PREFIX};
pub use clock::{Clock, SystemClock};
pub use tasks::{CachedTaskStore, TaskQueryCache, TASKS_CACHE_PREFIX};

use crate::config::{DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECS};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// A stored cache value plus its bookkeeping timestamps (epoch millis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The cached value.
    pub value: Value,
    /// When the entry was written.
    pub created_at: i64,
    /// When the entry stops being valid.
    pub expires_at: i64,
}

impl CacheEntry {
    /// Whether the entry has expired at `now`.
    #[must_use]
    pub const fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Physical storage for cache entries.
#[allow(clippy::missing_errors_doc)]
pub trait CacheBackend {
    /// Read an entry.
    fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Write an entry, replacing any previous one.
    fn put_entry(&self, key: &str, entry: &CacheEntry) -> Result<()>;

    /// Remove an entry. Removing a missing key is not an error.
    fn remove_entry(&self, key: &str) -> Result<()>;

    /// Every key currently stored.
    fn keys(&self) -> Result<Vec<String>>;
}

fn duration_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// A TTL cache over a [`CacheBackend`].
///
/// Expiry is checked on read: an expired entry is deleted and reported as a
/// miss. Every write first sweeps out expired entries, then evicts the oldest
/// entries while more than `max_entries` remain.
pub struct TtlCache {
    backend: Box<dyn CacheBackend + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
    default_ttl: Duration,
    max_entries: usize,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("default_ttl", &self.default_ttl)
            .field("max_entries", &self.max_entries)
            .finish_non_exhaustive()
    }
}

impl TtlCache {
    /// Create a cache with the default TTL (5 minutes) and entry bound.
    pub fn new(backend: impl CacheBackend + Send + Sync + 'static) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    /// Like [`new`](Self::new), for a backend chosen at runtime.
    #[must_use]
    pub fn from_boxed(backend: Box<dyn CacheBackend + Send + Sync>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            default_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }

    /// Use a different time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a different default TTL.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Use a different entry bound.
    #[must_use]
    pub const fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// The TTL applied by [`set`](Self::set) when none is given.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Read a live entry's value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let Some(entry) = self.backend.get_entry(key)? else {
            tracing::debug!(key, "cache miss");
            return Ok(None);
        };

        if entry.is_expired(self.clock.now_millis()) {
            tracing::debug!(key, "cache entry expired");
            self.backend.remove_entry(key)?;
            return Ok(None);
        }

        tracing::debug!(key, "cache hit");
        Ok(Some(entry.value))
    }

    /// Store a value. `ttl` defaults to the cache's default TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let now = self.clock.now_millis();
        self.sweep(now)?;

        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: now.saturating_add(duration_millis(ttl)),
        };
        self.backend.put_entry(key, &entry)?;
        self.evict_over_capacity()
    }

    /// Remove one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn remove(&self, key: &str) -> Result<()> {
        self.backend.remove_entry(key)
    }

    /// Remove every entry whose key starts with `prefix`, returning how many
    /// were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        let mut removed = 0;
        for key in self.backend.keys()? {
            if key.starts_with(prefix) {
                self.backend.remove_entry(&key)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn clear(&self) -> Result<()> {
        for key in self.backend.keys()? {
            self.backend.remove_entry(&key)?;
        }
        Ok(())
    }

    /// Number of stored entries, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn len(&self) -> Result<usize> {
        Ok(self.backend.keys()?.len())
    }

    /// Whether the cache holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn sweep(&self, now: i64) -> Result<()> {
        for key in self.backend.keys()? {
            if let Some(entry) = self.backend.get_entry(&key)? {
                if entry.is_expired(now) {
                    self.backend.remove_entry(&key)?;
                }
            }
        }
        Ok(())
    }

    fn evict_over_capacity(&self) -> Result<()> {
        let keys = self.backend.keys()?;
        if keys.len() <= self.max_entries {
            return Ok(());
        }

        let mut by_age = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.backend.get_entry(&key)? {
                by_age.push((entry.created_at, key));
            }
        }
        by_age.sort();

        let excess = by_age.len().saturating_sub(self.max_entries);
        tracing::debug!(excess, max_entries = self.max_entries, "evicting oldest cache entries");
        for (_, key) in by_age.into_iter().take(excess) {
            self.backend.remove_entry(&key)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use crate::testing::ManualClock;
    use serde_json::json;

    fn create_test_cache() -> (Arc<ManualClock>, TtlCache) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let backend = KeyValueCacheBackend::new(Arc::new(MemoryKeyValueStore::new()));
        let cache = TtlCache::new(backend).with_clock(clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_set_and_get() {
        let (_clock, cache) = create_test_cache();
        assert!(cache.get("k").unwrap().is_none());

        cache.set("k", json!({"a": 1}), None).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(json!({"a": 1})));
    }

    #[test]
    fn test_ttl_boundary() {
        let (clock, cache) = create_test_cache();
        cache.set("k", json!(1), Some(Duration::from_secs(10))).unwrap();

        clock.advance(Duration::from_millis(9_999));
        assert_eq!(cache.get("k").unwrap(), Some(json!(1)));

        clock.advance(Duration::from_millis(2));
        assert!(cache.get("k").unwrap().is_none());
        // The expired entry was deleted on read.
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_default_ttl_is_five_minutes() {
        let (clock, cache) = create_test_cache();
        assert_eq!(cache.default_ttl(), Duration::from_secs(300));

        cache.set("k", json!(1), None).unwrap();
        clock.advance(Duration::from_secs(299));
        assert!(cache.get("k").unwrap().is_some());
        clock.advance(Duration::from_secs(2));
        assert!(cache.get("k").unwrap().is_none());
    }

    #[test]
    fn test_write_sweeps_expired_entries() {
        let (clock, cache) = create_test_cache();
        cache.set("short", json!(1), Some(Duration::from_secs(1))).unwrap();
        cache.set("long", json!(2), Some(Duration::from_secs(100))).unwrap();

        clock.advance(Duration::from_secs(5));
        cache.set("new", json!(3), None).unwrap();

        assert_eq!(cache.len().unwrap(), 2);
        assert!(cache.get("long").unwrap().is_some());
    }

    #[test]
    fn test_evicts_oldest_over_capacity() {
        let (clock, cache) = create_test_cache();
        let cache = cache.with_max_entries(2);

        cache.set("a", json!(1), None).unwrap();
        clock.advance(Duration::from_millis(1));
        cache.set("b", json!(2), None).unwrap();
        clock.advance(Duration::from_millis(1));
        cache.set("c", json!(3), None).unwrap();

        assert_eq!(cache.len().unwrap(), 2);
        assert!(cache.get("a").unwrap().is_none());
        assert!(cache.get("c").unwrap().is_some());
    }

    #[test]
    fn test_remove_prefix_and_clear() {
        let (_clock, cache) = create_test_cache();
        cache.set("tasks:all", json!([]), None).unwrap();
        cache.set("tasks:date:2024-01-01", json!([]), None).unwrap();
        cache.set("other", json!(1), None).unwrap();

        assert_eq!(cache.remove_prefix("tasks:").unwrap(), 2);
        assert!(cache.get("other").unwrap().is_some());

        cache.remove("other").unwrap();
        cache.set("x", json!(1), None).unwrap();
        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_entry_is_expired() {
        let entry = CacheEntry { value: json!(null), created_at: 0, expires_at: 10 };
        assert!(!entry.is_expired(10));
        assert!(entry.is_expired(11));
    }
}

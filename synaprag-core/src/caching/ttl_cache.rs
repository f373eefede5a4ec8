//! Expiring key/value cache
//!
//! Entries are visible while `ttl` is unset or `now < created_at + ttl`.
//! Expired entries are dropped lazily by the next `get` of the same key;
//! there is no background sweep. An optional capacity bound evicts the least
//! recently used entry on insert.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        match self.ttl {
            None => true,
            // a deadline past the clock's range never expires
            Some(ttl) => self
                .created_at
                .checked_add(ttl)
                .map_or(true, |deadline| now < deadline),
        }
    }
}

/// Counters since the cache was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a value
    pub hits: u64,
    /// Lookups that found nothing (including expired entries)
    pub misses: u64,
    /// Calls to `set`
    pub insertions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Entries dropped by the capacity bound
    pub evictions: u64,
    /// Entries currently stored, expired or not
    pub size: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0.0 without lookups
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    stats: CacheStats,
}

/// Thread-safe TTL cache keyed by string
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: Option<NonZeroUsize>,
}

impl<V: Clone> TtlCache<V> {
    /// Cache without a size bound
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                stats: CacheStats::default(),
            }),
            capacity: None,
        }
    }

    /// Cache holding at most `capacity` entries
    pub fn bounded(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            capacity: Some(capacity),
        }
    }

    /// Bounded when `max_entries` is set and non-zero
    pub fn with_capacity(max_entries: Option<usize>) -> Self {
        match max_entries.and_then(NonZeroUsize::new) {
            Some(capacity) => Self::bounded(capacity),
            None => Self::new(),
        }
    }

    /// Capacity bound, if any
    pub fn capacity(&self) -> Option<NonZeroUsize> {
        self.capacity
    }

    /// Value for `key`, or `None` when absent or expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let lookup = inner
            .entries
            .get(key)
            .map(|entry| entry.is_live(now).then(|| entry.value.clone()));

        match lookup {
            None => {
                inner.stats.misses += 1;
                None
            },
            Some(Some(value)) => {
                inner.stats.hits += 1;
                Some(value)
            },
            Some(None) => {
                inner.entries.pop(key);
                inner.stats.expirations += 1;
                inner.stats.misses += 1;
                tracing::trace!(key, "cache entry expired");
                None
            },
        }
    }

    /// Store `value`, replacing any existing entry and restarting its clock
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl,
        };

        let mut inner = self.inner.lock();
        if let Some((evicted, _)) = inner.entries.push(key.clone(), entry) {
            if evicted != key {
                inner.stats.evictions += 1;
                tracing::trace!(key = %evicted, "cache entry evicted");
            }
        }
        inner.stats.insertions += 1;
    }

    /// Remove one entry; returns whether it existed
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().entries.pop(key).is_some()
    }

    /// Remove every key starting with `prefix`; returns how many were removed
    pub fn clear_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.inner.lock();
        let doomed: Vec<String> = inner
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.entries.pop(key);
        }
        tracing::debug!(prefix, removed = doomed.len(), "cleared cache prefix");
        doomed.len()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            ..inner.stats
        }
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("capacity", &self.capacity)
            .field("len", &self.inner.lock().entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_visible_until_ttl_elapses() {
        let cache = TtlCache::new();
        cache.set("embeddings:a:1", vec![1.0_f32], Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert_eq!(cache.get("embeddings:a:1"), Some(vec![1.0]));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("embeddings:a:1"), None);
        // purged on access
        assert_eq!(cache.len(), 0);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_linger_until_read() {
        let cache = TtlCache::new();
        cache.set("a", 1, Some(Duration::from_secs(1)));
        cache.set("b", 2, None);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_ttl_never_expires() {
        let cache = TtlCache::new();
        cache.set("k", 1, Some(Duration::from_secs(u64::MAX)));
        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;

        assert_eq!(cache.get("k"), Some(1));
        assert_eq!(cache.stats().expirations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_restamps() {
        let cache = TtlCache::new();
        cache.set("k", "old", Some(Duration::from_secs(5)));
        tokio::time::advance(Duration::from_secs(4)).await;
        cache.set("k", "new", Some(Duration::from_secs(5)));
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(cache.get("k"), Some("new"));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_clear_prefix_only_touches_matching_keys() {
        let cache = TtlCache::new();
        cache.set("embeddings:hash_embedder:1", 1, None);
        cache.set("embeddings:hash_embedder:2", 2, None);
        cache.set("embeddings:other:1", 3, None);
        cache.set("schema:documents", 4, None);

        assert_eq!(cache.clear_prefix("embeddings:hash_embedder:"), 2);
        assert_eq!(cache.get("embeddings:hash_embedder:1"), None);
        assert_eq!(cache.get("embeddings:other:1"), Some(3));
        assert_eq!(cache.get("schema:documents"), Some(4));
    }

    #[test]
    fn test_capacity_bound_evicts_least_recently_used() {
        let cache = TtlCache::with_capacity(Some(2));
        cache.set("a", 1, None);
        cache.set("b", 2, None);
        assert_eq!(cache.get("a"), Some(1));
        cache.set("c", 3, None);

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
        assert!(TtlCache::<i32>::with_capacity(Some(0)).capacity().is_none());
    }
}

//! Caching layer for normalized records to reduce provider calls
//!
//! Expiry is carried by each record (`ttl_expires_at`) and checked on lookup;
//! there is no background sweep. The store is bounded in entry count, with
//! least-recently-used eviction once full.

use cached::{Cached, ExpiringValueCache};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::key::SourceKey;
use crate::record::NormalizedRecord;

/// Default time-to-live for cached records
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached records
pub const DEFAULT_CAPACITY: usize = 1024;

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe record cache keyed by [`SourceKey`]
///
/// Cloning is cheap and yields a handle onto the same store.
#[derive(Clone)]
pub struct RecordCache {
    store: Arc<RwLock<ExpiringValueCache<SourceKey, NormalizedRecord>>>,
    ttl: Duration,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl RecordCache {
    /// Create a cache with the given default TTL and capacity
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            store: Arc::new(RwLock::new(ExpiringValueCache::with_size(capacity.max(1)))),
            ttl,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Default TTL applied by [`RecordCache::put`]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live record; expired entries read as absent
    pub async fn get(&self, key: &SourceKey) -> Option<NormalizedRecord> {
        let now = chrono::Utc::now();
        let found = {
            let mut store = self.store.write().await;
            store.cache_get(key).filter(|r| !r.is_expired_at(now)).cloned()
        };

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%key, "Cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%key, "Cache miss");
        }
        found
    }

    /// Store a record under the default TTL, replacing any previous entry
    ///
    /// Returns the stored copy, stamped with its expiry.
    pub async fn put(&self, key: SourceKey, record: NormalizedRecord) -> NormalizedRecord {
        self.put_with_ttl(key, record, self.ttl).await
    }

    /// Store a record with an explicit TTL for this key only
    pub async fn put_with_ttl(
        &self,
        key: SourceKey,
        record: NormalizedRecord,
        ttl: Duration,
    ) -> NormalizedRecord {
        let record = record.expiring_after(ttl);
        let mut store = self.store.write().await;
        let _ = store.cache_set(key, record.clone());
        record
    }

    /// Invalidate a specific cache entry
    pub async fn invalidate(&self, key: &SourceKey) -> bool {
        let mut store = self.store.write().await;
        store.cache_remove(key).is_some()
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        store.cache_clear();
    }

    /// Number of stored entries, including expired ones not yet looked up
    pub async fn len(&self) -> usize {
        let store = self.store.read().await;
        store.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCache")
            .field("ttl", &self.ttl)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{ProviderFamily, QueryParams};

    fn key(entity: &str) -> SourceKey {
        SourceKey::new(ProviderFamily::Macro, entity, QueryParams::new())
    }

    fn record(entity: &str, value: f64) -> NormalizedRecord {
        NormalizedRecord::builder(ProviderFamily::Macro, "fred", entity)
            .number("latest_value", Some(value))
            .build()
    }

    #[tokio::test]
    async fn test_cache_put_and_get() {
        let cache = RecordCache::new(Duration::from_secs(60), 16);
        let stored = cache.put(key("UNRATE"), record("UNRATE", 4.1)).await;

        assert_eq!(
            stored.ttl_expires_at(),
            stored.fetched_at() + chrono::Duration::seconds(60)
        );

        let retrieved = cache.get(&key("unrate")).await;
        assert_eq!(retrieved, Some(stored));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 0 });
    }

    #[tokio::test]
    async fn test_expired_entry_reads_absent() {
        let cache = RecordCache::new(Duration::ZERO, 16);
        cache.put(key("UNRATE"), record("UNRATE", 4.1)).await;

        assert!(cache.get(&key("UNRATE")).await.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_per_key_ttl_override() {
        let cache = RecordCache::new(Duration::ZERO, 16);
        cache
            .put_with_ttl(key("GDP"), record("GDP", 1.0), Duration::from_secs(3600))
            .await;
        cache.put(key("UNRATE"), record("UNRATE", 4.1)).await;

        assert!(cache.get(&key("GDP")).await.is_some());
        assert!(cache.get(&key("UNRATE")).await.is_none());
    }

    #[tokio::test]
    async fn test_refetch_replaces_entry() {
        let cache = RecordCache::new(Duration::from_secs(60), 16);
        cache.put(key("UNRATE"), record("UNRATE", 4.1)).await;
        cache.put(key("UNRATE"), record("UNRATE", 4.3)).await;

        assert_eq!(cache.len().await, 1);
        let current = cache.get(&key("UNRATE")).await.unwrap();
        assert_eq!(current.get("latest_value").and_then(|v| v.as_f64()), Some(4.3));
    }

    #[tokio::test]
    async fn test_cache_invalidation() {
        let cache = RecordCache::new(Duration::from_secs(60), 16);
        cache.put(key("UNRATE"), record("UNRATE", 4.1)).await;

        assert!(cache.invalidate(&key("UNRATE")).await);
        assert!(cache.get(&key("UNRATE")).await.is_none());
        assert!(!cache.invalidate(&key("UNRATE")).await);
    }

    #[tokio::test]
    async fn test_cache_clear() {
        let cache = RecordCache::default();

        for i in 0..5 {
            let name = format!("SERIES{i}");
            cache.put(key(&name), record(&name, f64::from(i))).await;
        }
        assert_eq!(cache.len().await, 5);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let cache = RecordCache::new(Duration::from_secs(60), 2);
        for name in ["A", "B", "C"] {
            cache.put(key(name), record(name, 1.0)).await;
        }
        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&key("A")).await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_store() {
        let cache = RecordCache::default();
        let other = cache.clone();
        other.put(key("UNRATE"), record("UNRATE", 4.1)).await;
        assert!(cache.get(&key("UNRATE")).await.is_some());
    }
}

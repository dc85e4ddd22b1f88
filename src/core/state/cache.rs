// src/core/state/cache.rs

//! Contains all state and logic shared by every connection that touches the cache:
//! the locked index, the blob store, and the per-key fetch locks.

use crate::config::CacheConfig;
use crate::core::ProxyError;
use crate::core::cache::{CacheEntry, CacheIndex, CacheStore, Lookup, storage_key};
use crate::core::metrics;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Holds the cache index and store plus the counters describing their use.
///
/// The index lock is a plain `parking_lot::Mutex` and is never held across an
/// `.await`: origin calls and disk I/O happen outside it.
#[derive(Debug)]
pub struct CacheState {
    index: Mutex<CacheIndex>,
    /// The on-disk blob store.
    pub store: CacheStore,
    /// Per-storage-key locks serializing refreshes of the same blob.
    fetch_locks: Arc<DashMap<String, Arc<AsyncMutex<()>>>>,
    delete_on_evict: bool,
    /// Counter for fresh cache hits.
    pub hits: AtomicU64,
    /// Counter for lookups that found no entry.
    pub misses: AtomicU64,
    /// Counter for lookups that found an expired entry.
    pub stale_hits: AtomicU64,
    /// Counter for index entries evicted to respect the capacity.
    pub evictions: AtomicU64,
    /// Counter for blob writes that failed.
    pub write_failures: AtomicU64,
}

/// Holds a per-key fetch lock. Dropping it releases the lock and forgets the
/// lock entry once nobody else is waiting on it.
pub struct FetchLockGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Drop for FetchLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map itself holds one reference; anything above that is a waiter.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl CacheState {
    /// Creates the cache state from its configuration section.
    pub fn new(config: &CacheConfig) -> Result<Self, ProxyError> {
        let capacity = NonZeroUsize::new(config.max_entries).ok_or_else(|| {
            ProxyError::Internal("cache.max_entries must be at least 1".to_string())
        })?;
        Ok(Self {
            index: Mutex::new(CacheIndex::new(capacity, config.ttl())),
            store: CacheStore::new(&config.directory),
            fetch_locks: Arc::new(DashMap::new()),
            delete_on_evict: config.delete_on_evict,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_hits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        })
    }

    /// Looks `path` up and, if the entry is fresh, bumps it to MRU inside the
    /// same critical section.
    pub fn lookup_and_touch(&self, path: &str, now: Instant) -> Lookup {
        let mut index = self.index.lock();
        let lookup = index.lookup(path, now);
        if matches!(lookup, Lookup::Fresh(_)) {
            index.touch(path);
        }
        lookup
    }

    /// Waits for exclusive refresh rights on `storage_key`.
    pub async fn fetch_lock(&self, storage_key: &str) -> FetchLockGuard {
        let lock = self
            .fetch_locks
            .entry(storage_key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        FetchLockGuard {
            key: storage_key.to_string(),
            guard: Some(lock.lock_owned().await),
            locks: self.fetch_locks.clone(),
        }
    }

    /// Like `fetch_lock`, but gives up immediately if the key is being refreshed.
    fn try_fetch_lock(&self, storage_key: &str) -> Option<FetchLockGuard> {
        let lock = self
            .fetch_locks
            .entry(storage_key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let guard = FetchLockGuard {
            key: storage_key.to_string(),
            guard: lock.try_lock_owned().ok(),
            locks: self.fetch_locks.clone(),
        };
        guard.guard.is_some().then_some(guard)
    }

    /// Persists a successful origin response for `path` and records it in the index.
    ///
    /// The blob is committed before the index entry is inserted, so an entry never
    /// points at bytes that were not written. On a write failure the index is left
    /// untouched and the error is returned for logging. The caller must hold the
    /// fetch lock for the path's storage key.
    pub async fn commit(&self, path: &str, body: &[u8], now: Instant) -> Result<(), ProxyError> {
        let key = storage_key(path);
        if let Err(e) = self.store.write(&key, body).await {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
            metrics::CACHE_WRITE_FAILURES_TOTAL.inc();
            return Err(e);
        }

        let (evicted, len) = {
            let mut index = self.index.lock();
            let evicted = index.put(path, &key, now);
            (evicted, index.len())
        };
        metrics::CACHE_ENTRIES.set(len as f64);
        debug!("Cached '{}' as '{}'", path, key);

        if let Some(entry) = evicted {
            info!("Evicting {}", entry.path);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            metrics::CACHE_EVICTIONS_TOTAL.inc();
            if self.delete_on_evict {
                self.reclaim(entry).await;
            }
        }
        Ok(())
    }

    /// Deletes the blob of an evicted entry unless another live entry shares its
    /// storage key or a refresh of that key is in flight.
    async fn reclaim(&self, entry: CacheEntry) {
        let Some(_guard) = self.try_fetch_lock(&entry.storage_key) else {
            debug!(
                "Skipping blob reclaim for '{}': a refresh is in flight",
                entry.storage_key
            );
            return;
        };
        if self.index.lock().references(&entry.storage_key) {
            debug!(
                "Keeping blob '{}': still referenced by another path",
                entry.storage_key
            );
            return;
        }
        if let Err(e) = self.store.remove(&entry.storage_key).await {
            warn!(
                "Failed to delete evicted blob '{}': {}",
                entry.storage_key, e
            );
        }
    }

    /// Reads the blob behind a fresh entry.
    pub async fn read(&self, entry: &CacheEntry) -> Result<Bytes, ProxyError> {
        self.store.read(&entry.storage_key).await
    }

    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.lock().contains(path)
    }

    /// A snapshot of the cached paths from least to most recently used.
    pub fn paths_lru_order(&self) -> Vec<String> {
        self.index.lock().paths_lru_order()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_HITS_TOTAL.inc();
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_MISSES_TOTAL.inc();
    }

    pub fn record_stale(&self) {
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_STALE_TOTAL.inc();
    }
}

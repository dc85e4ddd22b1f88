// src/core/cache/index.rs

//! Defines the `CacheIndex`, the bounded, recency-ordered map from request path
//! to the blob that holds its last successful response.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

/// A single index record. The storage key names the blob in the `CacheStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: String,
    pub storage_key: String,
    pub fetched_at: Instant,
}

impl CacheEntry {
    /// Returns `true` while the entry is younger than `ttl`. An entry whose age
    /// equals the TTL is already stale.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

/// The outcome of an index lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Fresh(CacheEntry),
    /// Present but expired. Served exactly like a miss.
    Stale(CacheEntry),
    Miss,
}

/// The bounded LRU index. The LRU end of the underlying `LruCache` is the
/// eviction candidate; the MRU end holds the most recently inserted or hit path.
#[derive(Debug)]
pub struct CacheIndex {
    entries: LruCache<String, CacheEntry>,
    ttl: Duration,
}

impl CacheIndex {
    /// Creates an empty index holding at most `capacity` paths.
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Classifies `path` without changing its recency.
    pub fn lookup(&self, path: &str, now: Instant) -> Lookup {
        match self.entries.peek(path) {
            Some(entry) if entry.is_fresh(now, self.ttl) => Lookup::Fresh(entry.clone()),
            Some(entry) => Lookup::Stale(entry.clone()),
            None => Lookup::Miss,
        }
    }

    /// Moves `path` to the MRU end. The fetch timestamp is left alone: only a new
    /// origin fetch restarts the TTL clock.
    pub fn touch(&mut self, path: &str) {
        self.entries.promote(path);
    }

    /// Inserts or replaces the entry for `path` at the MRU end.
    ///
    /// When a new path arrives at a full index, the LRU entry is dropped and
    /// returned so the caller can decide what happens to its blob. Replacing an
    /// existing path never evicts.
    pub fn put(&mut self, path: &str, storage_key: &str, now: Instant) -> Option<CacheEntry> {
        let entry = CacheEntry {
            path: path.to_string(),
            storage_key: storage_key.to_string(),
            fetched_at: now,
        };
        match self.entries.push(path.to_string(), entry) {
            Some((old_path, _)) if old_path == path => None,
            Some((_, evicted)) => Some(evicted),
            None => None,
        }
    }

    /// Returns `true` if any live entry stores its response under `storage_key`.
    /// Distinct paths can share a key (`/a/b` and `/a_b`).
    pub fn references(&self, storage_key: &str) -> bool {
        self.entries.iter().any(|(_, e)| e.storage_key == storage_key)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A snapshot of the cached paths from least to most recently used.
    pub fn paths_lru_order(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(k, _)| k.clone()).collect()
    }
}

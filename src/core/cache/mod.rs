// src/core/cache/mod.rs

//! The caching engine: the in-memory recency index and the on-disk blob store.

pub mod index;
pub mod store;

pub use index::{CacheEntry, CacheIndex, Lookup};
pub use store::{CacheStore, DEFAULT_STORAGE_KEY, storage_key};

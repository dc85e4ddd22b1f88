// src/core/state/stats.rs

//! Contains state definitions and logic for proxy statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Holds all state and logic related to proxy-wide statistics and monitoring.
#[derive(Debug)]
pub struct StatsState {
    /// The total number of connections accepted since startup.
    total_connections: AtomicU64,
    /// The total number of requests that parsed successfully.
    total_requests: AtomicU64,
    /// The number of non-GET requests forwarded to the origin.
    forwarded_requests: AtomicU64,
    /// The number of origin exchanges that failed or timed out.
    origin_failures: AtomicU64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    /// Creates a new `StatsState` with initialized counters.
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            forwarded_requests: AtomicU64::new(0),
            origin_failures: AtomicU64::new(0),
        }
    }

    /// Atomically increments the total number of connections received.
    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total number of connections received.
    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    /// Atomically increments the total number of parsed requests.
    pub fn increment_total_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total number of parsed requests.
    pub fn get_total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn increment_forwarded_requests(&self) {
        self.forwarded_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_forwarded_requests(&self) -> u64 {
        self.forwarded_requests.load(Ordering::Relaxed)
    }

    pub fn increment_origin_failures(&self) {
        self.origin_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_origin_failures(&self) -> u64 {
        self.origin_failures.load(Ordering::Relaxed)
    }
}

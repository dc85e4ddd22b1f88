// src/core/metrics.rs

//! Defines and registers Prometheus metrics for proxy monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};
use tracing::warn;

lazy_static! {
    // --- Connection Gauges and Counters ---
    /// The number of clients currently connected to the proxy.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("cacheproxy_connected_clients", "Number of currently connected clients.").unwrap();
    /// The total number of connections accepted since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("cacheproxy_connections_received_total", "Total number of connections received.").unwrap();
    /// The total number of parsed requests, labeled by HTTP method.
    pub static ref REQUESTS_TOTAL: CounterVec =
        register_counter_vec!("cacheproxy_requests_total", "Total number of parsed client requests, labeled by method.", &["method"]).unwrap();


    // --- Cache Counters ---
    /// GET requests answered from a fresh blob.
    pub static ref CACHE_HITS_TOTAL: Counter =
        register_counter!("cacheproxy_cache_hits_total", "Total number of fresh cache hits.").unwrap();
    /// GET requests for paths with no index entry.
    pub static ref CACHE_MISSES_TOTAL: Counter =
        register_counter!("cacheproxy_cache_misses_total", "Total number of cache misses.").unwrap();
    /// GET requests for paths whose entry had outlived the TTL.
    pub static ref CACHE_STALE_TOTAL: Counter =
        register_counter!("cacheproxy_cache_stale_total", "Total number of expired cache entries encountered.").unwrap();
    /// Index entries dropped to respect the capacity.
    pub static ref CACHE_EVICTIONS_TOTAL: Counter =
        register_counter!("cacheproxy_cache_evictions_total", "Total number of cache entries evicted.").unwrap();
    /// Blob writes that failed; the response was still delivered.
    pub static ref CACHE_WRITE_FAILURES_TOTAL: Counter =
        register_counter!("cacheproxy_cache_write_failures_total", "Total number of failed blob writes.").unwrap();
    /// The number of paths currently held by the index.
    pub static ref CACHE_ENTRIES: Gauge =
        register_gauge!("cacheproxy_cache_entries", "Number of entries in the cache index.").unwrap();


    // --- Origin ---
    /// Origin exchanges that failed or timed out.
    pub static ref ORIGIN_FAILURES_TOTAL: Counter =
        register_counter!("cacheproxy_origin_failures_total", "Total number of failed origin requests.").unwrap();
    /// A histogram of origin round-trip latencies.
    pub static ref ORIGIN_FETCH_LATENCY_SECONDS: Histogram =
        register_histogram!("cacheproxy_origin_fetch_latency_seconds", "Latency of origin requests in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| {
            warn!("Failed to encode metrics: {}", e);
            String::new()
        })
}

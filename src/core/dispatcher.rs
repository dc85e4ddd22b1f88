// src/core/dispatcher.rs

//! Defines the `ProxyDispatcher`, which turns one parsed client request into the
//! exact bytes to send back: a cached blob, a relayed origin response, or nothing.

use crate::core::cache::{Lookup, storage_key};
use crate::core::metrics;
use crate::core::protocol::{HttpRequest, is_cacheable, parse_status_code};
use crate::core::state::ServerState;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs the cache protocol for GET requests and forwards everything else.
#[derive(Debug, Clone)]
pub struct ProxyDispatcher {
    state: Arc<ServerState>,
}

impl ProxyDispatcher {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// Produces the response for `request`. An empty result means nothing is
    /// written back before the connection closes.
    pub async fn dispatch(&self, request: &HttpRequest) -> Bytes {
        self.state.stats.increment_total_requests();
        metrics::REQUESTS_TOTAL
            .with_label_values(&[request.method.as_str()])
            .inc();

        if request.is_get() {
            self.serve_get(&request.path).await
        } else {
            self.forward(request).await
        }
    }

    /// Relays a non-GET request to the origin without touching the cache.
    async fn forward(&self, request: &HttpRequest) -> Bytes {
        info!("Forwarding {} request for {} directly to origin", request.method, request.path);
        self.state.stats.increment_forwarded_requests();
        let body = (!request.body.is_empty()).then_some(request.body.as_ref());
        self.fetch_from_origin(&request.method, &request.path, body)
            .await
            .unwrap_or_default()
    }

    async fn serve_get(&self, path: &str) -> Bytes {
        let cache = &self.state.cache;
        match cache.lookup_and_touch(path, Instant::now()) {
            Lookup::Fresh(entry) => match cache.read(&entry).await {
                Ok(body) => {
                    info!("Cache HIT for {}", path);
                    cache.record_hit();
                    return body;
                }
                Err(e) => {
                    warn!("Cache entry for {} is unreadable ({}), refetching", path, e);
                    cache.record_miss();
                }
            },
            Lookup::Stale(_) => {
                info!("Cache EXPIRED for {}", path);
                cache.record_stale();
            }
            Lookup::Miss => {
                info!("Cache MISS for {}", path);
                cache.record_miss();
            }
        }
        self.refresh(path).await
    }

    /// Fetches `path` from the origin and caches a 200 response.
    ///
    /// Refreshes of the same storage key are serialized; a request that waited
    /// behind another refresh is served the newly committed blob instead of
    /// going back to the origin.
    async fn refresh(&self, path: &str) -> Bytes {
        let cache = &self.state.cache;
        let _fetch_guard = cache.fetch_lock(&storage_key(path)).await;

        if let Lookup::Fresh(entry) = cache.lookup_and_touch(path, Instant::now())
            && let Ok(body) = cache.read(&entry).await
        {
            debug!("{} was refreshed by a concurrent request", path);
            return body;
        }

        let Some(response) = self.fetch_from_origin("GET", path, None).await else {
            return Bytes::new();
        };

        if is_cacheable(&response) {
            if let Err(e) = cache.commit(path, &response, Instant::now()).await {
                warn!("Serving {} without caching it: {}", path, e);
            }
        } else {
            match parse_status_code(&response) {
                Some(status) => debug!("Not caching {}: origin answered {}", path, status),
                None => debug!("Not caching {}: unreadable status line", path),
            }
        }
        response
    }

    /// Performs one origin exchange. Failures are logged and counted and come
    /// back as `None`.
    async fn fetch_from_origin(&self, method: &str, path: &str, body: Option<&[u8]>) -> Option<Bytes> {
        let timer = metrics::ORIGIN_FETCH_LATENCY_SECONDS.start_timer();
        let result = self.state.origin.fetch(method, path, body).await;
        timer.observe_duration();

        match result {
            Ok(response) => Some(response),
            Err(e) if e.is_origin_failure() => {
                warn!("Error contacting origin for {} {}: {}", method, path, e);
                self.state.stats.increment_origin_failures();
                metrics::ORIGIN_FAILURES_TOTAL.inc();
                None
            }
            Err(e) => {
                error!("Origin exchange for {} {} failed locally: {}", method, path, e);
                None
            }
        }
    }
}

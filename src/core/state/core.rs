// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared proxy-wide state.

use super::cache::CacheState;
use super::stats::StatsState;
use crate::config::Config;
use crate::core::ProxyError;
use crate::core::origin::{OriginClient, TcpOriginClient};
use std::sync::Arc;
use tracing::info;

/// The central struct holding all shared, proxy-wide state.
/// This struct is wrapped in an `Arc` and handed to every connection handler,
/// providing a single owner for the cache and the origin client.
pub struct ServerState {
    /// The proxy configuration. Fixed for the lifetime of the process.
    pub config: Config,
    /// The cache index, blob store and cache counters.
    pub cache: CacheState,
    /// The client used for every origin exchange.
    pub origin: Arc<dyn OriginClient>,
    /// Holds all proxy-wide statistics.
    pub stats: StatsState,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// Initializes the proxy state with a TCP origin client built from the config.
    pub fn initialize(config: Config) -> Result<Arc<Self>, ProxyError> {
        let origin = Arc::new(TcpOriginClient::from_config(&config.origin));
        Self::with_origin(config, origin)
    }

    /// Initializes the proxy state around an explicit origin client.
    pub fn with_origin(
        config: Config,
        origin: Arc<dyn OriginClient>,
    ) -> Result<Arc<Self>, ProxyError> {
        let cache = CacheState::new(&config.cache)?;
        info!(
            "Cache initialized: {} entries max, TTL {}s, directory '{}'.",
            config.cache.max_entries,
            config.cache.ttl_seconds,
            config.cache.directory
        );
        Ok(Arc::new(Self {
            config,
            cache,
            origin,
            stats: StatsState::new(),
        }))
    }
}

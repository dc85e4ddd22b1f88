// src/server/initialization.rs

//! Handles the complete proxy initialization process, from state setup to
//! preparing the cache directory and binding the listener.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::state::ServerState;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Initializes all proxy components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let server_state = ServerState::initialize(config)?;
    info!("Proxy state initialized.");

    setup_cache_directory(&server_state).await?;

    let config = &server_state.config;
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(
        "Proxy listening on {}:{} with TTL={}",
        config.host, config.port, config.cache.ttl_seconds
    );
    let connection_permits = Arc::new(Semaphore::new(config.max_clients));

    Ok(ServerContext {
        state: server_state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        connection_permits,
    })
}

/// Makes sure the blob directory exists before the first request arrives.
async fn setup_cache_directory(server_state: &Arc<ServerState>) -> Result<()> {
    let store = &server_state.cache.store;
    store.ensure_dir().await.map_err(|e| {
        anyhow!(
            "Failed to create cache directory '{}': {}",
            store.root().display(),
            e
        )
    })?;
    info!("On-disk cache directory '{}' is ready.", store.root().display());
    Ok(())
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Origin server is {}:{} (connect timeout {:?}, request timeout {:?}).",
        config.origin.host,
        config.origin.port,
        config.origin.connect_timeout,
        config.origin.request_timeout
    );
    if config.cache.delete_on_evict {
        info!("Evicted cache blobs are deleted from disk.");
    } else {
        warn!("cache.delete_on_evict is off. The cache directory will grow without bound.");
    }
}

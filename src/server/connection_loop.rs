// src/server/connection_loop.rs

//! Contains the main proxy loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use crate::connection::ConnectionHandler;
use crate::core::metrics;
use anyhow::anyhow;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// How long in-flight connections and background tasks get to finish once
/// shutdown starts.
const CONNECTION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The main proxy loop that accepts connections and handles graceful shutdown.
///
/// Every connection runs in its own task; a failing or panicking handler is
/// logged and never stops the loop.
pub async fn run(mut ctx: ServerContext) {
    let mut client_tasks = JoinSet::new();

    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))
        .expect("Failed to create SIGINT stream");
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))
        .expect("Failed to create SIGTERM stream");

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, draining connections.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, draining connections.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => { error!("A background task exited early. Shutting down."); break; }
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = ctx.listener.accept(), if ctx.connection_permits.available_permits() > 0 => {
                match res {
                    Ok((socket, addr)) => {
                        let Ok(permit) = ctx.connection_permits.clone().try_acquire_owned() else {
                            warn!("No connection permit available for {}, closing it.", addr);
                            continue;
                        };
                        info!("Accepted new connection from: {}", addr);
                        ctx.state.stats.increment_total_connections();
                        metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

                        let handler = ConnectionHandler::new(
                            socket,
                            addr,
                            ctx.state.clone(),
                            ctx.shutdown_tx.subscribe(),
                        );
                        client_tasks.spawn(async move {
                            let _permit = permit;
                            if let Err(e) = handler.run().await {
                                warn!("Connection from {} terminated unexpectedly: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A connection task panicked: {e:?}");
                }
            },
        }
    }

    info!("Proxy shutting down. Notifying connections and background tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        warn!("No task was listening for the shutdown signal.");
    }

    info!("Waiting for in-flight connections to finish...");
    if tokio::time::timeout(CONNECTION_DRAIN_TIMEOUT, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for connections to finish. Aborting the rest.");
        client_tasks.shutdown().await;
    }
    info!("All client connections are closed.");

    if tokio::time::timeout(CONNECTION_DRAIN_TIMEOUT, async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Background tasks did not stop within the drain timeout.");
    };

    let cache = &ctx.state.cache;
    info!(
        "Proxy shutdown complete. connections={} requests={} hits={} misses={} stale={} evictions={} origin_failures={}",
        ctx.state.stats.get_total_connections(),
        ctx.state.stats.get_total_requests(),
        cache.hits.load(Ordering::Relaxed),
        cache.misses.load(Ordering::Relaxed),
        cache.stale_hits.load(Ordering::Relaxed),
        cache.evictions.load(Ordering::Relaxed),
        ctx.state.stats.get_origin_failures(),
    );
}

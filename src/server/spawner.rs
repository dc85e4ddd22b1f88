// src/server/spawner.rs

//! Spawns the proxy's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use anyhow::Result;
use tracing::info;

/// Spawns every enabled background task into the context's `JoinSet`. The
/// accept loop treats the exit of any of them as fatal.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let metrics = &ctx.state.config.metrics;
    if !metrics.enabled {
        info!("Metrics exporter disabled; set [metrics] enabled = true to expose /metrics.");
        return Ok(());
    }

    let exporter = metrics_server::run_metrics_server(ctx.state.clone(), ctx.shutdown_tx.subscribe());
    ctx.background_tasks.spawn(exporter);
    info!("Metrics exporter task spawned on port {}.", metrics.port);
    Ok(())
}

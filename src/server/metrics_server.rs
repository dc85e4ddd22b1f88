// src/server/metrics_server.rs

use crate::core::metrics::{self, gather_metrics};
use crate::core::state::ServerState;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Router, routing::get};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Serves `GET /metrics` in the Prometheus text format.
async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    // Sampled on scrape as well as on every commit.
    metrics::CACHE_ENTRIES.set(state.cache.len() as f64);
    ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], gather_metrics())
}

/// Runs the metrics exporter on the proxy's listen host until shutdown.
pub async fn run_metrics_server(
    state: Arc<ServerState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let host = state.config.host.clone();
    let port = state.config.metrics.port;
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind metrics exporter on {host}:{port}"))?;
    info!(
        "Metrics exporter listening on http://{}/metrics",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            debug!("Metrics exporter stopping.");
        })
        .await
        .context("Metrics exporter failed")
}

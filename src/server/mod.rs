// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;

/// The main proxy startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Initialize proxy state, cache directory and listener.
    let mut server_context = initialization::setup(config).await?;

    // 2. Spawn all background tasks.
    spawner::spawn_all(&mut server_context).await?;

    // 3. Start the main connection acceptance loop. This function will run until shutdown.
    connection_loop::run(server_context).await;

    Ok(())
}

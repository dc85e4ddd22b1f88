// src/main.rs

//! The main entry point for the caching proxy.

use anyhow::Result;
use cacheproxy::config::{Config, DEFAULT_CONFIG_PATH};
use cacheproxy::server;
use std::env;
use std::path::Path;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    // Collect command-line arguments to decide the execution mode.
    let args: Vec<String> = env::args().collect();

    // Handle the --version flag.
    if args.contains(&"--version".to_string()) {
        println!("cacheproxy version {VERSION}");
        return Ok(());
    }

    // An explicit --config path must load; the default path is optional.
    let explicit_config = args
        .iter()
        .position(|arg| arg == "--config")
        .map(|i| args.get(i + 1).cloned());
    let config_path = match explicit_config {
        Some(Some(path)) => Some(path),
        Some(None) => {
            eprintln!("--config flag requires a value");
            std::process::exit(1);
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Some(DEFAULT_CONFIG_PATH.to_string()),
        None => None,
    };

    let mut config = match config_path {
        Some(path) => match Config::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{path}\": {e:#}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    // The first positional argument is the cache TTL in seconds.
    if let Some(ttl_arg) = positional_args(&args).next() {
        match ttl_arg.parse::<u64>() {
            Ok(ttl) => config.cache.ttl_seconds = ttl,
            Err(_) => {
                eprintln!("Invalid TTL seconds: {ttl_arg}");
                eprintln!("Usage: cacheproxy [TTL_SECONDS] [--config /path/to/config.toml]");
                std::process::exit(1);
            }
        }
    }

    // Get initial log level from env var or config.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());

    // Initialize the global subscriber with the filter and formatting layers.
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true), // Enable ANSI color codes for log levels.
        )
        .init();

    if let Err(e) = server::run(config).await {
        error!("Proxy runtime error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Yields the arguments that are neither flags nor flag values.
fn positional_args(args: &[String]) -> impl Iterator<Item = &String> {
    let mut skip_next = false;
    args.iter().skip(1).filter(move |arg| {
        if skip_next {
            skip_next = false;
            return false;
        }
        if *arg == "--config" {
            skip_next = true;
            return false;
        }
        !arg.starts_with("--")
    })
}

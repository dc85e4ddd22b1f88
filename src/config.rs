// src/config.rs

//! Manages proxy configuration: loading from TOML, defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// The file consulted when no `--config` flag is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Where uncached and non-GET requests are sent.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OriginConfig {
    #[serde(default = "default_origin_host")]
    pub host: String,
    #[serde(default = "default_origin_port")]
    pub port: u16,
    /// Deadline for establishing the TCP connection. `0s` waits forever.
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Deadline for the whole exchange, connect included. `0s` waits forever.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
}

fn default_origin_host() -> String {
    "127.0.0.1".to_string()
}
fn default_origin_port() -> u16 {
    8000
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            host: default_origin_host(),
            port: default_origin_port(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Configuration for the response cache.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    /// The directory holding one blob per cached path.
    #[serde(default = "default_cache_directory")]
    pub directory: String,
    /// The maximum number of paths held by the index.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// How long a fetched response is served without going back to the origin.
    /// The first positional command-line argument overrides this value.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// If true, a blob is deleted when its index entry is evicted and no other
    /// entry shares its storage key.
    #[serde(default = "default_delete_on_evict")]
    pub delete_on_evict: bool,
    /// How long to wait for a client to send its request. `0s` waits forever.
    #[serde(with = "humantime_serde", default = "default_client_read_timeout")]
    pub client_read_timeout: Duration,
}

fn default_cache_directory() -> String {
    "./cache".to_string()
}
fn default_max_entries() -> usize {
    10
}
fn default_ttl_seconds() -> u64 {
    10
}
fn default_delete_on_evict() -> bool {
    true
}
fn default_client_read_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            max_entries: default_max_entries(),
            ttl_seconds: default_ttl_seconds(),
            delete_on_evict: default_delete_on_evict(),
            client_read_timeout: default_client_read_timeout(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

/// The complete proxy configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            origin: OriginConfig::default(),
            cache: CacheConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.origin.host.trim().is_empty() {
            return Err(anyhow!("origin.host cannot be empty"));
        }
        if self.origin.port == 0 {
            return Err(anyhow!("origin.port cannot be 0"));
        }
        if self.cache.directory.trim().is_empty() {
            return Err(anyhow!("cache.directory cannot be empty"));
        }
        if self.cache.max_entries == 0 {
            return Err(anyhow!("cache.max_entries cannot be 0"));
        }
        if self.cache.ttl_seconds == 0 {
            warn!("cache.ttl_seconds is 0. Every GET will be fetched from the origin.");
        }
        if self.origin.request_timeout.is_zero() {
            warn!("origin.request_timeout is disabled. A stalled origin can hold a connection forever.");
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main proxy port"
                ));
            }
        }
        Ok(())
    }
}

// src/core/origin.rs

//! The client side of the proxy: one fresh TCP connection to the fixed origin
//! per request, read until the origin closes it.

use crate::config::OriginConfig;
use crate::core::ProxyError;
use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Sends a single request to the origin and returns its raw response bytes.
///
/// Implementations must turn every transport fault into an `Err` instead of
/// panicking; the dispatcher relies on that to keep serving.
#[async_trait]
pub trait OriginClient: Send + Sync {
    async fn fetch(
        &self,
        method: &str,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<Bytes, ProxyError>;
}

/// The production `OriginClient`, speaking plain HTTP/1.1 over TCP.
#[derive(Debug, Clone)]
pub struct TcpOriginClient {
    host: String,
    port: u16,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl TcpOriginClient {
    /// Creates a client with no deadlines, matching a plain blocking exchange.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: None,
            request_timeout: None,
        }
    }

    /// Creates a client from the `[origin]` config section. Zero durations disable
    /// the corresponding deadline.
    pub fn from_config(config: &OriginConfig) -> Self {
        Self::new(config.host.clone(), config.port)
            .with_timeouts(config.connect_timeout, config.request_timeout)
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = Some(connect).filter(|d| !d.is_zero());
        self.request_timeout = Some(request).filter(|d| !d.is_zero());
        self
    }

    /// The `Host` header value sent with every request.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reconstructs the request sent upstream. Client headers are deliberately
    /// not carried over; only `Host` and `Connection: close` are synthesized.
    pub fn build_request(&self, method: &str, path: &str, body: Option<&[u8]>) -> Vec<u8> {
        let mut request = format!(
            "{method} {path} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.authority()
        )
        .into_bytes();
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            request.extend_from_slice(body);
        }
        request
    }

    async fn exchange(&self, request: &[u8]) -> Result<Bytes, ProxyError> {
        let mut stream = with_deadline(
            self.connect_timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await?
        .map_err(|e| ProxyError::OriginUnavailable(format!("connect to {}: {e}", self.authority())))?;

        stream
            .write_all(request)
            .await
            .map_err(|e| ProxyError::OriginUnavailable(format!("send: {e}")))?;

        let mut response = Vec::new();
        stream
            .read_to_end(&mut response)
            .await
            .map_err(|e| ProxyError::OriginUnavailable(format!("receive: {e}")))?;
        Ok(Bytes::from(response))
    }
}

#[async_trait]
impl OriginClient for TcpOriginClient {
    async fn fetch(
        &self,
        method: &str,
        path: &str,
        body: Option<&[u8]>,
    ) -> Result<Bytes, ProxyError> {
        let request = self.build_request(method, path, body);
        debug!("Sending {} {} to origin {}", method, path, self.authority());
        with_deadline(self.request_timeout, self.exchange(&request)).await?
    }
}

/// Runs `fut` under an optional deadline; an elapsed deadline is an origin failure.
async fn with_deadline<F: Future>(
    deadline: Option<Duration>,
    fut: F,
) -> Result<F::Output, ProxyError> {
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ProxyError::OriginTimeout),
        None => Ok(fut.await),
    }
}

// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client
//! connection: read one request, answer it once, close.

use super::guard::ConnectionGuard;
use crate::core::protocol::{HttpRequest, HttpRequestCodec};
use crate::core::state::ServerState;
use crate::core::{ProxyDispatcher, ProxyError};
use futures::StreamExt;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::FramedRead;
use tracing::debug;

/// Manages the full lifecycle of a client connection.
pub struct ConnectionHandler {
    socket: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl ConnectionHandler {
    /// Creates a new `ConnectionHandler`.
    pub fn new(
        socket: TcpStream,
        addr: SocketAddr,
        state: Arc<ServerState>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            socket,
            addr,
            state,
            shutdown_rx,
        }
    }

    /// Reads a single request, dispatches it and writes back at most one response.
    ///
    /// A request that cannot be parsed closes the connection without a response.
    /// The connection is always closed when this returns.
    pub async fn run(self) -> Result<(), ProxyError> {
        let Self {
            mut socket,
            addr,
            state,
            mut shutdown_rx,
        } = self;
        let _guard = ConnectionGuard::new(addr);
        let read_timeout = state.config.cache.client_read_timeout;

        let (reader, mut writer) = socket.split();
        let mut framed = FramedRead::new(reader, HttpRequestCodec);

        let request = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                debug!("Connection {} closed by shutdown before a request arrived.", addr);
                return Ok(());
            }
            result = read_request(&mut framed, read_timeout) => result,
        };

        let request = match request {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("Connection from {} closed by peer without a request.", addr);
                return Ok(());
            }
            Err(e) => {
                debug!("Dropping connection from {}: {}", addr, e);
                return Ok(());
            }
        };
        debug!(
            "{} {} from {} (Host: {})",
            request.method,
            request.path,
            addr,
            request.header("Host").unwrap_or("-")
        );

        let response = ProxyDispatcher::new(state).dispatch(&request).await;
        if !response.is_empty() {
            writer.write_all(&response).await?;
        }
        writer.shutdown().await?;
        Ok(())
    }
}

/// Waits for the first complete request, bounded by `limit` unless it is zero.
///
/// When the deadline passes with bytes buffered but no terminating blank line,
/// whatever arrived is parsed as the request. A silent client times out.
async fn read_request<R: AsyncRead + Unpin>(
    framed: &mut FramedRead<R, HttpRequestCodec>,
    limit: Duration,
) -> Result<Option<HttpRequest>, ProxyError> {
    if limit.is_zero() {
        return framed.next().await.transpose();
    }
    match tokio::time::timeout(limit, framed.next()).await {
        Ok(next) => next.transpose(),
        Err(_) => {
            let pending = framed.read_buffer_mut().split();
            if pending.is_empty() {
                return Err(std::io::Error::from(ErrorKind::TimedOut).into());
            }
            debug!("Read deadline passed, parsing {} buffered bytes", pending.len());
            HttpRequest::parse(&pending).map(Some)
        }
    }
}

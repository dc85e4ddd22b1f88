// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection bookkeeping.

use crate::core::metrics;
use std::net::SocketAddr;
use tracing::debug;

/// An RAII guard keeping the connected-clients gauge accurate no matter how a
/// connection handler exits, including by panic.
pub struct ConnectionGuard {
    /// The network address of the client.
    addr: SocketAddr,
}

impl ConnectionGuard {
    /// Creates a new `ConnectionGuard` and counts the connection as active.
    pub(crate) fn new(addr: SocketAddr) -> Self {
        metrics::CONNECTED_CLIENTS.inc();
        Self { addr }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::CONNECTED_CLIENTS.dec();
        debug!("Connection {} closed", self.addr);
    }
}

// src/core/mod.rs

//! The central module containing the caching engine, the request protocol and
//! the per-request dispatch logic of the proxy.

pub mod cache;
pub mod dispatcher;
pub mod errors;
pub mod metrics;
pub mod origin;
pub mod protocol;
pub mod state;

pub use dispatcher::ProxyDispatcher;
pub use errors::ProxyError;
pub use protocol::HttpRequest;

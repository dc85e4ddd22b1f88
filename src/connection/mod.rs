// src/connection/mod.rs

//! Manages the lifecycle of a single client TCP connection: request framing,
//! dispatch, and the single response written before the socket closes.

mod guard;
mod handler;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;

// src/core/errors.rs

//! Defines the primary error type for the proxy.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing every failure the request path can observe.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// The request line had fewer than three tokens or was not valid text.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// The header block or declared body exceeded the codec limits.
    #[error("Request exceeds the maximum allowed size")]
    RequestTooLarge,

    /// Connect, reset, DNS or any other transport fault while talking to the origin.
    #[error("Origin unavailable: {0}")]
    OriginUnavailable(String),

    #[error("Origin did not answer before the deadline")]
    OriginTimeout,

    #[error("Cached blob '{0}' not found")]
    BlobNotFound(String),

    #[error("Failed to persist cached blob: {0}")]
    CacheWrite(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for ProxyError {
    fn clone(&self) -> Self {
        match self {
            ProxyError::Io(e) => ProxyError::Io(Arc::clone(e)),
            ProxyError::MalformedRequest(s) => ProxyError::MalformedRequest(s.clone()),
            ProxyError::RequestTooLarge => ProxyError::RequestTooLarge,
            ProxyError::OriginUnavailable(s) => ProxyError::OriginUnavailable(s.clone()),
            ProxyError::OriginTimeout => ProxyError::OriginTimeout,
            ProxyError::BlobNotFound(s) => ProxyError::BlobNotFound(s.clone()),
            ProxyError::CacheWrite(s) => ProxyError::CacheWrite(s.clone()),
            ProxyError::Internal(s) => ProxyError::Internal(s.clone()),
        }
    }
}

impl PartialEq for ProxyError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ProxyError::Io(e1), ProxyError::Io(e2)) => e1.kind() == e2.kind(),
            (ProxyError::MalformedRequest(s1), ProxyError::MalformedRequest(s2)) => s1 == s2,
            (ProxyError::OriginUnavailable(s1), ProxyError::OriginUnavailable(s2)) => s1 == s2,
            (ProxyError::BlobNotFound(s1), ProxyError::BlobNotFound(s2)) => s1 == s2,
            (ProxyError::CacheWrite(s1), ProxyError::CacheWrite(s2)) => s1 == s2,
            (ProxyError::Internal(s1), ProxyError::Internal(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl ProxyError {
    /// Returns `true` for failures that mean the origin could not be reached or
    /// did not answer in time.
    pub fn is_origin_failure(&self) -> bool {
        matches!(
            self,
            ProxyError::OriginUnavailable(_) | ProxyError::OriginTimeout
        )
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> Self {
        ProxyError::Io(Arc::new(e))
    }
}

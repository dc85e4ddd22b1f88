// src/core/protocol/mod.rs

pub mod request;
pub mod response;
pub use request::{HttpRequest, HttpRequestCodec};
pub use response::{is_cacheable, parse_status_code};

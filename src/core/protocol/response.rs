// src/core/protocol/response.rs

//! Structured inspection of raw origin responses.

/// The only status code whose responses are stored in the cache.
pub const CACHEABLE_STATUS: u16 = 200;

/// Header slots offered to the parser. Responses with more headers still
/// yield their status code.
const MAX_HEADERS: usize = 64;

/// Parses the numeric status code out of the status line of a raw response.
///
/// The status line must be a well-formed `HTTP/1.x <3-digit code> [reason]`.
/// Anything else, including an empty response, yields `None`. A head cut off
/// after the status line still yields its code.
pub fn parse_status_code(raw: &[u8]) -> Option<u16> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut response = httparse::Response::new(&mut headers);

    match response.parse(raw) {
        Ok(_) | Err(httparse::Error::TooManyHeaders) => response.code,
        Err(_) => None,
    }
}

/// Returns `true` if the response may be stored. Unreadable status lines are
/// treated as non-cacheable.
pub fn is_cacheable(raw: &[u8]) -> bool {
    parse_status_code(raw) == Some(CACHEABLE_STATUS)
}

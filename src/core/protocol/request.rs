// src/core/protocol/request.rs

//! Implements the client request structure and the corresponding `Decoder` that
//! frames a single HTTP/1.x request out of a connection's byte stream.

use crate::core::ProxyError;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// The blank line separating the request head from the body.
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";
const HEAD_TERMINATOR_LEN: usize = 4;

// Limits to keep a single connection from pinning unbounded memory.
const MAX_HEAD_SIZE: usize = 64 * 1024;
const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// A decoded client request. Only the method and path drive proxy decisions;
/// the headers are kept for framing and diagnostics and are never forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    /// Parses a complete request out of `raw`.
    ///
    /// The request line must carry at least a method, a path and a version token.
    /// Header lines without a colon are skipped. Everything after the first blank
    /// line is the body; without a blank line the body is empty.
    pub fn parse(raw: &[u8]) -> Result<Self, ProxyError> {
        let (head, body) = match find_head_end(raw) {
            Some(pos) => (
                &raw[..pos],
                Bytes::copy_from_slice(&raw[pos + HEAD_TERMINATOR_LEN..]),
            ),
            None => (raw, Bytes::new()),
        };

        let head = String::from_utf8_lossy(head);
        let mut lines = head.split("\r\n");
        let request_line = lines.next().unwrap_or_default();

        let mut tokens = request_line.split_whitespace();
        let (Some(method), Some(path), Some(version)) =
            (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(ProxyError::MalformedRequest(format!(
                "request line '{request_line}' needs a method, a path and a version"
            )));
        };

        Ok(Self {
            method: method.to_string(),
            path: path.to_string(),
            version: version.to_string(),
            headers: lines.filter_map(parse_header_line).collect(),
            body,
        })
    }

    /// Returns the first header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Only an exact `GET` takes the caching path.
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// Splits a `Name: value` line. Lines without a colon or with an empty name yield `None`.
fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Returns the offset of the blank line terminating the request head.
fn find_head_end(src: &[u8]) -> Option<usize> {
    src.windows(HEAD_TERMINATOR_LEN)
        .position(|window| window == HEAD_TERMINATOR)
}

/// Reads a parseable `Content-Length` out of a raw request head.
fn declared_content_length(head: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(head)
        .split("\r\n")
        .skip(1)
        .filter_map(parse_header_line)
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse().ok())
}

/// A `tokio_util::codec` implementation that yields exactly one `HttpRequest`
/// per complete head (plus `Content-Length` bytes of body, when declared).
#[derive(Debug, Default)]
pub struct HttpRequestCodec;

impl Decoder for HttpRequestCodec {
    type Item = HttpRequest;
    type Error = ProxyError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(head_end) = find_head_end(src) else {
            if src.len() > MAX_HEAD_SIZE {
                return Err(ProxyError::RequestTooLarge);
            }
            return Ok(None);
        };
        if head_end > MAX_HEAD_SIZE {
            return Err(ProxyError::RequestTooLarge);
        }

        let body_start = head_end + HEAD_TERMINATOR_LEN;
        let frame_len = match declared_content_length(&src[..head_end]) {
            Some(len) if len > MAX_BODY_SIZE => return Err(ProxyError::RequestTooLarge),
            Some(len) => {
                let needed = body_start + len;
                if src.len() < needed {
                    src.reserve(needed - src.len());
                    return Ok(None);
                }
                needed
            }
            // Without a declared length the body is whatever has arrived so far.
            None => src.len(),
        };

        let frame = src.split_to(frame_len);
        HttpRequest::parse(&frame).map(Some)
    }

    /// At EOF, whatever is buffered is parsed as the request, even if the head
    /// was never terminated or the declared body is short.
    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(request) = self.decode(buf)? {
            return Ok(Some(request));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let frame = buf.split_to(buf.len());
        HttpRequest::parse(&frame).map(Some)
    }
}

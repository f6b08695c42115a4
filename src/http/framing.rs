//! Wire framing for HTTP/1.x messages.
//!
//! # Responsibilities
//! - Render status lines and header blocks
//! - Assemble status line, headers and body into one wire-correct buffer
//! - Parse a plain header block into an ordered mapping
//! - Read a request head (request line plus headers) off the transport
//!
//! # Design Decisions
//! - Status line parts are interpolated raw, not validated, so malformed
//!   upstream codes pass through unchanged
//! - Header names are title-cased on render (`etag` becomes `Etag`)
//! - The request head ends at the first empty line; a body is never read here

use std::fmt::Display;

use indexmap::IndexMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::ProxyError;

pub const CRLF: &str = "\r\n";

/// Ordered header mapping. Duplicate names keep the last value.
pub type Headers = IndexMap<String, String>;

/// Render `HTTP/{version} {code} {reason}`. Raw interpolation, not validated.
pub fn build_status_line(version: impl Display, code: impl Display, reason: impl Display) -> String {
    format!("HTTP/{} {} {}", version, code, reason)
}

/// Append CRLF unless the text already ends with it.
pub fn ensure_trailing_crlf(text: &str) -> String {
    if text.ends_with(CRLF) {
        text.to_string()
    } else {
        format!("{}{}", text, CRLF)
    }
}

/// Title-case a header name: first letter of each alphabetic run upper,
/// the rest lower.
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_alpha = false;
    for ch in name.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Render each header as `Name: value\r\n` in iteration order.
pub fn render_headers<I, K, V>(headers: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Display,
{
    let mut text = String::new();
    for (name, value) in headers {
        text.push_str(&title_case(name.as_ref()));
        text.push_str(": ");
        text.push_str(&value.to_string());
        text.push_str(CRLF);
    }
    text
}

/// Assemble `CRLF(status) + CRLF(headers) + CRLF + content`.
pub fn build_response(status_line: &str, headers_text: &str, content: &[u8]) -> Vec<u8> {
    let status_line = ensure_trailing_crlf(status_line);
    let headers_text = ensure_trailing_crlf(headers_text);

    let mut message =
        Vec::with_capacity(status_line.len() + headers_text.len() + CRLF.len() + content.len());
    message.extend_from_slice(status_line.as_bytes());
    message.extend_from_slice(headers_text.as_bytes());
    message.extend_from_slice(CRLF.as_bytes());
    message.extend_from_slice(content);
    message
}

/// Parse `Name: value` lines into an ordered mapping.
///
/// Lines are trimmed and split on the first `": "`. A blank block yields an
/// empty mapping; any other line without the separator is an error.
pub fn parse_header_block(text: &str) -> Result<Headers, ProxyError> {
    let mut headers = Headers::new();
    let text = text.trim();
    if text.is_empty() {
        return Ok(headers);
    }

    for line in text.split('\n') {
        let line = line.trim();
        let (name, value) = line
            .split_once(": ")
            .ok_or_else(|| ProxyError::HeaderSyntax(line.to_string()))?;
        headers.insert(name.to_string(), value.to_string());
    }
    Ok(headers)
}

/// Read the request line and headers, up to and including the first empty
/// line (`"\r\n"` or a bare `"\n"`).
///
/// Reaching EOF first returns whatever was read. At most `limit` bytes are
/// accepted.
pub async fn read_request_head<R>(reader: &mut R, limit: usize) -> Result<String, ProxyError>
where
    R: AsyncBufRead + Unpin,
{
    let mut limited = AsyncReadExt::take(reader, limit as u64 + 1);
    let mut head = Vec::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        let read = limited.read_until(b'\n', &mut line).await?;
        if read == 0 {
            break;
        }
        head.extend_from_slice(&line);
        if head.len() > limit {
            return Err(ProxyError::RequestHeadTooLarge { limit });
        }
        if line == b"\r\n" || line == b"\n" {
            break;
        }
    }

    String::from_utf8(head).map_err(|e| ProxyError::TransportType(e.to_string()))
}

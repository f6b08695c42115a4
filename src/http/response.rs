//! Upstream response handling and transformation.
//!
//! # Responsibilities
//! - Resolve the upstream URL and dispatch the request
//! - Rewrite HTML bodies through the word marker
//! - Normalize headers so framing matches the final body
//! - Re-frame the result as a wire-correct HTTP/1.1 message
//!
//! # Design Decisions
//! - The whole body is buffered; no chunked relay
//! - Header normalization runs after content rewriting, since marking changes
//!   the body length
//! - The session closes after one response, so `Connection: close` is set

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::error::ProxyError;
use crate::http::framing::{build_response, build_status_line, render_headers};
use crate::http::request::UserRequest;
use crate::rewrite::marker::{charset_encoding, WordMarker};
use crate::upstream::{UpstreamClient, UpstreamResponse};

/// HTTP version used on every relayed status line.
pub const RELAY_HTTP_VERSION: &str = "1.1";

/// Response headers that describe the upstream hop only.
const HOP_BY_HOP_RESPONSE_HEADERS: &[&str] = &["connection", "keep-alive"];

/// Status line, rendered header block and body of one relayed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpParts {
    pub status_line: String,
    pub headers_text: String,
    pub content: Bytes,
}

impl HttpParts {
    /// Frame the parts into a single wire buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        build_response(&self.status_line, &self.headers_text, &self.content)
    }
}

/// Fetches upstream responses and prepares them for relay.
#[derive(Clone)]
pub struct ResponseTransformer {
    upstream_base_url: String,
    client: Arc<dyn UpstreamClient>,
    marker: Option<WordMarker>,
}

impl std::fmt::Debug for ResponseTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseTransformer")
            .field("upstream_base_url", &self.upstream_base_url)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

impl ResponseTransformer {
    /// `marker` of `None` relays every body unchanged.
    pub fn new(
        upstream_base_url: impl Into<String>,
        client: Arc<dyn UpstreamClient>,
        marker: Option<WordMarker>,
    ) -> Self {
        Self {
            upstream_base_url: upstream_base_url.into(),
            client,
            marker,
        }
    }

    pub fn resolve_upstream_url(&self, request_url: &str) -> String {
        resolve_upstream_url(request_url, &self.upstream_base_url)
    }

    /// Send the request upstream. Failures are not retried.
    pub async fn dispatch(&self, request: &UserRequest) -> Result<UpstreamResponse, ProxyError> {
        let url = self.resolve_upstream_url(&request.url);
        tracing::debug!(method = %request.method, url = %url, "Dispatching upstream");
        self.client.send(&request.method, &url, &request.headers).await
    }

    /// Mark words in HTML bodies; everything else passes through byte for byte.
    ///
    /// HTML is rewritten in the charset its Content-Type declares (UTF-8 when
    /// none is given). A charset that cannot be streamed leaves the body as is.
    pub fn transform_content(
        &self,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<Bytes, ProxyError> {
        let (Some(marker), Some(content_type)) = (&self.marker, content_type) else {
            return Ok(body);
        };
        if !content_type.contains("text/html") {
            return Ok(body);
        }
        match charset_encoding(content_type) {
            Some(encoding) => Ok(Bytes::from(marker.apply_bytes(&body, encoding)?)),
            None => {
                tracing::debug!(content_type, "Unsupported charset, HTML relayed unmarked");
                Ok(body)
            }
        }
    }

    /// Split an upstream response into relay-ready parts.
    pub fn relay_parts(&self, response: UpstreamResponse) -> Result<HttpParts, ProxyError> {
        let status_line =
            build_status_line(RELAY_HTTP_VERSION, response.status, &response.reason);

        let content_type = response
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let content = self.transform_content(response.body, content_type)?;
        let headers = normalize_headers(&response.headers, &content);

        Ok(HttpParts {
            status_line,
            headers_text: render_header_map(&headers),
            content,
        })
    }

    /// Build the full wire response for an upstream response.
    pub fn build_relay_response(&self, response: UpstreamResponse) -> Result<Vec<u8>, ProxyError> {
        Ok(self.relay_parts(response)?.into_bytes())
    }

}

/// Plain concatenation; slashes are not normalized.
pub fn resolve_upstream_url(request_url: &str, upstream_base_url: &str) -> String {
    format!("{}{}", upstream_base_url, request_url)
}

/// Drop encoding and hop-by-hop headers and set `Content-Length` to the final
/// body length.
pub fn normalize_headers(headers: &HeaderMap, final_body: &[u8]) -> HeaderMap {
    let mut normalized = headers.clone();
    normalized.remove(header::TRANSFER_ENCODING);
    normalized.remove(header::CONTENT_ENCODING);
    for name in HOP_BY_HOP_RESPONSE_HEADERS {
        normalized.remove(*name);
    }
    normalized.insert(header::CONTENT_LENGTH, HeaderValue::from(final_body.len()));
    normalized.insert(header::CONNECTION, HeaderValue::from_static("close"));
    normalized
}

/// Render a header map one line per value.
pub fn render_header_map(headers: &HeaderMap) -> String {
    render_headers(
        headers
            .iter()
            .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes()))),
    )
}

/// Framed `502 Bad Gateway` used when the upstream cannot be reached.
pub fn bad_gateway_response() -> Vec<u8> {
    let body = b"Upstream request failed";
    let headers = render_headers([
        ("content-type", "text/plain; charset=utf-8".to_string()),
        ("content-length", body.len().to_string()),
        ("connection", "close".to_string()),
    ]);
    build_response(
        &build_status_line(RELAY_HTTP_VERSION, 502, "Bad Gateway"),
        &headers,
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::framing::Headers;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingUpstream {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl UpstreamClient for RecordingUpstream {
        async fn send(
            &self,
            method: &str,
            url: &str,
            _headers: &Headers,
        ) -> Result<UpstreamResponse, ProxyError> {
            self.seen.lock().unwrap().push((method.to_string(), url.to_string()));
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            Ok(UpstreamResponse {
                status: 200,
                reason: "OK".into(),
                headers,
                body: Bytes::from_static(b"ok"),
            })
        }
    }

    fn transformer(marker: Option<WordMarker>) -> ResponseTransformer {
        ResponseTransformer::new(
            "https://example.com",
            Arc::new(RecordingUpstream::default()),
            marker,
        )
    }

    fn html_marker() -> Option<WordMarker> {
        Some(WordMarker::new(6, "™", true).unwrap())
    }

    #[test]
    fn upstream_url_is_plain_concatenation() {
        assert_eq!(resolve_upstream_url("", ""), "");
        assert_eq!(resolve_upstream_url("/item?helloworld=true", "fafagh/"), "fafagh//item?helloworld=true");
        assert_eq!(resolve_upstream_url("/", "https://fafa"), "https://fafa/");
        assert_eq!(resolve_upstream_url("///", "http://fafa"), "http://fafa///");
    }

    #[tokio::test]
    async fn dispatch_uses_resolved_url() {
        let upstream = Arc::new(RecordingUpstream::default());
        let transformer = ResponseTransformer::new("https://example.com", upstream.clone(), None);
        let request = UserRequest {
            method: "GET".into(),
            url: "/news?p=2".into(),
            http_version: "HTTP/1.1".into(),
            headers: Headers::new(),
        };
        let response = transformer.dispatch(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(
            upstream.seen.lock().unwrap().as_slice(),
            &[("GET".to_string(), "https://example.com/news?p=2".to_string())]
        );
    }

    #[test]
    fn non_html_passes_through() {
        let body = Bytes::from_static(b"\xff\xfe abcdef binary");
        let t = transformer(html_marker());
        assert_eq!(t.transform_content(body.clone(), Some("image/png")).unwrap(), body);
        assert_eq!(t.transform_content(body.clone(), None).unwrap(), body);
        assert_eq!(t.transform_content(body.clone(), Some("TEXT/HTML")).unwrap(), body);
    }

    #[test]
    fn html_is_marked() {
        let t = transformer(html_marker());
        let out = t
            .transform_content(Bytes::from("<p>abcdef</p>"), Some("text/html; charset=utf-8"))
            .unwrap();
        assert_eq!(out, Bytes::from("<p>abcdef™</p>"));
    }

    #[test]
    fn html_keeps_declared_charset() {
        let t = transformer(html_marker());
        let body = Bytes::from_static(b"<p>\xef\xf0\xee\xea\xf1\xe8 xyz</p>");
        let out = t
            .transform_content(body, Some("text/html; charset=windows-1251"))
            .unwrap();
        assert_eq!(out, Bytes::from_static(b"<p>\xef\xf0\xee\xea\xf1\xe8\x99 xyz</p>"));
    }

    #[test]
    fn unsupported_charset_passes_through() {
        let t = transformer(html_marker());
        let body = Bytes::from_static(b"<\0p\0>\0");
        let out = t
            .transform_content(body.clone(), Some("text/html; charset=utf-16le"))
            .unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn disabled_marker_passes_html_through() {
        let t = transformer(None);
        let body = Bytes::from("<p>abcdef</p>");
        assert_eq!(t.transform_content(body.clone(), Some("text/html")).unwrap(), body);
    }

    #[test]
    fn normalized_headers_match_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("3"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::ETAG, HeaderValue::from_static("\"v1\""));

        let normalized = normalize_headers(&headers, b"hello world");
        assert!(normalized.get(header::TRANSFER_ENCODING).is_none());
        assert!(normalized.get(header::CONTENT_ENCODING).is_none());
        assert_eq!(normalized[header::CONTENT_LENGTH], "11");
        assert_eq!(normalized[header::CONNECTION], "close");
        assert_eq!(normalized[header::ETAG], "\"v1\"");
    }

    #[test]
    fn relay_response_is_framed() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        headers.insert(header::ETAG, HeaderValue::from_static("abc"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let response = UpstreamResponse {
            status: 200,
            reason: "OK".into(),
            headers,
            body: Bytes::from("<b>abcdef</b>"),
        };
        let out = transformer(html_marker()).build_relay_response(response).unwrap();
        let body = "<b>abcdef™</b>";
        let expected = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nEtag: abc\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn bad_gateway_is_well_formed() {
        let out = String::from_utf8(bad_gateway_response()).unwrap();
        assert!(out.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
        assert!(out.contains("Content-Length: 23\r\n"));
        assert!(out.ends_with("\r\n\r\nUpstream request failed"));
    }
}

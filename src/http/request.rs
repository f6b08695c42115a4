//! Client request parsing and host rewriting.
//!
//! # Responsibilities
//! - Rewrite the proxy authority in the raw request text to the upstream host
//! - Split the rewritten text into method, url, version and header block
//! - Produce an immutable [`UserRequest`] per connection
//!
//! # Design Decisions
//! - Request framing is header-only; no body is ever parsed
//! - The header block is the untouched fourth token, so values with spaces
//!   survive the whitespace split

use std::sync::Arc;

use crate::error::ProxyError;
use crate::http::framing::{parse_header_block, Headers};
use crate::rewrite::host::HostRewrite;

/// Structured client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRequest {
    pub method: String,
    /// Origin-form path and query as sent by the client.
    pub url: String,
    pub http_version: String,
    pub headers: Headers,
}

impl UserRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Turns raw request text into a [`UserRequest`] aimed at the upstream.
#[derive(Debug, Clone)]
pub struct RequestRewriter {
    host_rewrite: Arc<dyn HostRewrite>,
}

impl RequestRewriter {
    pub fn new(host_rewrite: Arc<dyn HostRewrite>) -> Self {
        Self { host_rewrite }
    }

    /// Rewrite the declared host in the raw request text.
    pub fn rewrite_host(&self, raw_request: &str) -> String {
        self.host_rewrite.rewrite(raw_request)
    }

    /// Parse already rewritten request text.
    pub fn parse(&self, request_text: &str) -> Result<UserRequest, ProxyError> {
        parse_request(request_text)
    }

    /// Rewrite then parse.
    pub fn rewrite(&self, raw_request: &str) -> Result<UserRequest, ProxyError> {
        self.parse(&self.rewrite_host(raw_request))
    }
}

/// Split on whitespace into at most four pieces and parse the last as headers.
pub fn parse_request(request_text: &str) -> Result<UserRequest, ProxyError> {
    let mut rest = request_text.trim_start();
    let mut tokens: [&str; 3] = [""; 3];

    for (i, slot) in tokens.iter_mut().enumerate() {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if end == 0 {
            return Err(ProxyError::RequestSyntax(format!(
                "expected 4 tokens, found {}",
                i
            )));
        }
        *slot = &rest[..end];
        rest = rest[end..].trim_start();
    }

    if rest.is_empty() {
        return Err(ProxyError::RequestSyntax(
            "expected 4 tokens, found 3".to_string(),
        ));
    }

    let [method, url, http_version] = tokens;
    Ok(UserRequest {
        method: method.to_string(),
        url: url.to_string(),
        http_version: http_version.to_string(),
        headers: parse_header_block(rest)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::host::SubstringHostRewrite;

    fn rewriter() -> RequestRewriter {
        RequestRewriter::new(Arc::new(
            SubstringHostRewrite::from_parts("proxyhost", 8888, "https://example.com").unwrap(),
        ))
    }

    #[test]
    fn parses_minimal_request() {
        let request = parse_request("POST /a HTTP/1.1\nHost: x\n\n").unwrap();
        let mut headers = Headers::new();
        headers.insert("Host".into(), "x".into());
        assert_eq!(
            request,
            UserRequest {
                method: "POST".into(),
                url: "/a".into(),
                http_version: "HTTP/1.1".into(),
                headers,
            }
        );
    }

    #[test]
    fn parses_request_with_leading_whitespace() {
        let text = "\nPOST /hello.123141 HTTP/1.1\nHost: 127.0.0.1:8888\nUser-Agent: curl/7.81.0\nAccept: */*\n    ";
        let request = parse_request(text).unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "/hello.123141");
        assert_eq!(request.http_version, "HTTP/1.1");
        let names: Vec<_> = request.headers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Host", "User-Agent", "Accept"]);
        assert_eq!(request.headers["Accept"], "*/*");
    }

    #[test]
    fn header_values_keep_spaces() {
        let request =
            parse_request("GET / HTTP/1.1\r\nUser-Agent: Mozilla/5.0 (X11; Linux)\r\n\r\n").unwrap();
        assert_eq!(request.headers["User-Agent"], "Mozilla/5.0 (X11; Linux)");
        assert_eq!(request.header("user-agent"), Some("Mozilla/5.0 (X11; Linux)"));
    }

    #[test]
    fn too_few_tokens_is_syntax_error() {
        for text in ["", "GET", "GET /", "GET / HTTP/1.1\r\n\r\n"] {
            assert!(matches!(parse_request(text), Err(ProxyError::RequestSyntax(_))));
        }
    }

    #[test]
    fn bad_header_line_is_header_error() {
        let err = parse_request("GET / HTTP/1.1\r\nbroken\r\n\r\n").unwrap_err();
        assert!(matches!(err, ProxyError::HeaderSyntax(_)));
    }

    #[test]
    fn rewrite_points_host_at_upstream() {
        let request = rewriter()
            .rewrite("GET /page?q=1 HTTP/1.1\r\nHost: proxyhost:8888\r\nAccept: */*\r\n\r\n")
            .unwrap();
        assert_eq!(request.headers["Host"], "example.com");
        assert_eq!(request.url, "/page?q=1");
    }
}

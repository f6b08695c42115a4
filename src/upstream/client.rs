//! Upstream client capability.
//!
//! # Responsibilities
//! - Send one request to the upstream origin and buffer the whole response
//! - Filter hop-by-hop and body framing headers out of the forwarded request
//! - Map every transport failure to `UpstreamUnavailable`
//!
//! # Design Decisions
//! - No retries; a failed dispatch fails the session
//! - Timeouts live in the client, configured once at startup
//! - The client decodes gzip/brotli/deflate itself, so relayed bodies are
//!   always identity-encoded

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Method;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::http::framing::Headers;

/// Request headers never forwarded upstream.
const SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
    "transfer-encoding",
    "content-length",
    "accept-encoding",
];

/// Buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub reason: String,
    /// Case-insensitive, multi-valued.
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Sends requests to the upstream origin.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
    ) -> Result<UpstreamResponse, ProxyError>;
}

/// [`UpstreamClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let redirects = if config.max_redirects == 0 {
            Policy::none()
        } else {
            Policy::limited(config.max_redirects)
        };

        let mut builder = reqwest::Client::builder().redirect(redirects);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| ProxyError::UpstreamUnavailable(format!("client setup: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstream {
    async fn send(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
    ) -> Result<UpstreamResponse, ProxyError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ProxyError::RequestSyntax(format!("invalid method {:?}", method)))?;

        let response = self
            .client
            .request(method, url)
            .headers(forwarded_headers(headers))
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;

        Ok(UpstreamResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

/// Convert client headers to a forwardable map, dropping hop-by-hop and
/// body framing headers.
pub fn forwarded_headers(headers: &Headers) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if SKIPPED_REQUEST_HEADERS
            .iter()
            .any(|skipped| name.eq_ignore_ascii_case(skipped))
        {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                forwarded.insert(name, value);
            }
            _ => {
                tracing::warn!(header = %name, "Skipping invalid request header");
            }
        }
    }
    forwarded
}

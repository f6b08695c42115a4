//! Error taxonomy for a single proxy session.
//!
//! # Design Decisions
//! - Every variant is local to one session; none of them touches shared state,
//!   so the accept loop keeps running after any failure
//! - `InvalidUpstreamConfig` is raised at startup only, never per request
//! - No variant is retried by the core

use thiserror::Error;

/// Errors that can occur while proxying one request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Upstream base URL cannot be split into scheme and authority.
    #[error("invalid upstream url {url:?}: {reason}")]
    InvalidUpstreamConfig { url: String, reason: String },

    /// Bytes read from the transport are not decodable request text.
    #[error("transport yielded non-text request data: {0}")]
    TransportType(String),

    /// Request line plus headers did not contain four tokens.
    #[error("malformed request: {0}")]
    RequestSyntax(String),

    /// A header line lacks the `": "` separator.
    #[error("malformed header line {0:?}")]
    HeaderSyntax(String),

    /// Request head exceeded the configured size limit.
    #[error("request head exceeds {limit} bytes")]
    RequestHeadTooLarge { limit: usize },

    /// Upstream dispatch failed (connect, DNS, timeout, protocol).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// HTML content rewriting failed.
    #[error("content rewrite failed: {0}")]
    ContentRewrite(String),

    /// Socket I/O failure on the client connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Short, stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::InvalidUpstreamConfig { .. } => "invalid_upstream_config",
            ProxyError::TransportType(_) => "transport_type",
            ProxyError::RequestSyntax(_) => "request_syntax",
            ProxyError::HeaderSyntax(_) => "header_syntax",
            ProxyError::RequestHeadTooLarge { .. } => "request_head_too_large",
            ProxyError::UpstreamUnavailable(_) => "upstream_unavailable",
            ProxyError::ContentRewrite(_) => "content_rewrite",
            ProxyError::Io(_) => "io",
        }
    }
}

//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (address the clients connect to).
    pub listener: ListenerConfig,

    /// The single upstream origin every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// HTML content rewriting.
    pub rewrite: RewriteConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

impl ProxyConfig {
    /// `host:port` the clients put in their `Host` header.
    pub fn proxy_authority(&self) -> String {
        format!("{}:{}", self.listener.host, self.listener.port)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind; also the host part matched by the host rewrite.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Maximum size of request line plus headers.
    pub max_request_head_bytes: usize,

    /// Handle each connection in its own task instead of one at a time.
    pub concurrent: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8888,
            max_request_head_bytes: 64 * 1024,
            concurrent: false,
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Absolute base URL (`scheme://host[:port]`) requests are appended to.
    pub base_url: String,

    /// Total request timeout in seconds. Unbounded when unset.
    pub timeout_secs: Option<u64>,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: Option<u64>,

    /// Redirects followed by the upstream client (0 disables).
    pub max_redirects: usize,

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` for upstream connections.
    pub use_system_proxy: bool,

    /// Answer upstream failures with a 502 instead of closing the connection.
    pub bad_gateway_on_error: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: None,
            connect_timeout_secs: Some(10),
            max_redirects: 10,
            use_system_proxy: true,
            bad_gateway_on_error: false,
        }
    }
}

/// HTML word marking configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RewriteConfig {
    /// Rewrite `text/html` bodies at all.
    pub enabled: bool,

    /// Exact length of words that get marked.
    pub word_length: usize,

    /// Text appended after each marked word.
    pub marker: String,

    /// Count any Unicode letter or digit as a word character
    /// (otherwise ASCII letters and digits only).
    pub unicode_words: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            word_length: 6,
            marker: "™".to_string(),
            unicode_words: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` overrides it.
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

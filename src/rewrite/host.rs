//! Host rewriting from the proxy authority to the upstream authority.
//!
//! The rewrite is a plain substring substitution over the raw request text,
//! so an accidental match in the request path is rewritten too. It sits behind
//! [`HostRewrite`] so a header-aware strategy can replace it without touching
//! callers.

use crate::error::ProxyError;

/// Strategy for pointing the client-declared host at the upstream.
pub trait HostRewrite: Send + Sync + std::fmt::Debug {
    /// Return the raw request text with the host rewritten.
    fn rewrite(&self, raw_request: &str) -> String;
}

/// Replaces every `{listen_host}:{listen_port}` occurrence with the upstream host.
#[derive(Debug, Clone)]
pub struct SubstringHostRewrite {
    proxy_authority: String,
    upstream_host: String,
}

impl SubstringHostRewrite {
    pub fn new(proxy_authority: impl Into<String>, upstream_host: impl Into<String>) -> Self {
        Self {
            proxy_authority: proxy_authority.into(),
            upstream_host: upstream_host.into(),
        }
    }

    /// Build from the listener address and the upstream base URL.
    pub fn from_parts(
        listen_host: &str,
        listen_port: u16,
        upstream_base_url: &str,
    ) -> Result<Self, ProxyError> {
        let upstream_host = derive_upstream_host(upstream_base_url)?;
        Ok(Self::new(format!("{}:{}", listen_host, listen_port), upstream_host))
    }

    pub fn proxy_authority(&self) -> &str {
        &self.proxy_authority
    }

    pub fn upstream_host(&self) -> &str {
        &self.upstream_host
    }
}

impl HostRewrite for SubstringHostRewrite {
    fn rewrite(&self, raw_request: &str) -> String {
        rewrite_host(raw_request, &self.proxy_authority, &self.upstream_host)
    }
}

/// Replace every occurrence of `proxy_authority` with `upstream_host`.
pub fn rewrite_host(raw_request: &str, proxy_authority: &str, upstream_host: &str) -> String {
    if proxy_authority.is_empty() {
        return raw_request.to_string();
    }
    raw_request.replace(proxy_authority, upstream_host)
}

/// Extract the authority that follows the first `"://"` of the upstream URL.
///
/// Anything from the first `/`, `?` or `#` after the authority is dropped.
pub fn derive_upstream_host(upstream_base_url: &str) -> Result<String, ProxyError> {
    let invalid = |reason: &str| ProxyError::InvalidUpstreamConfig {
        url: upstream_base_url.to_string(),
        reason: reason.to_string(),
    };

    let (_, rest) = upstream_base_url
        .split_once("://")
        .ok_or_else(|| invalid("missing \"://\" separator"))?;

    let end = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());
    let authority = &rest[..end];
    if authority.is_empty() {
        return Err(invalid("empty authority"));
    }
    Ok(authority.to_string())
}

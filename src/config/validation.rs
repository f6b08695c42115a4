//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject an upstream URL without scheme and authority
//! - Validate value ranges (word length, limits, timeouts)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: &ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs once at startup; a failure is fatal

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::rewrite::host::derive_upstream_host;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.base_url: {0}")]
    UpstreamUrl(String),

    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    validate_upstream_url(&config.upstream.base_url, &mut errors);

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::Empty { field: "listener.host" });
    }
    if config.listener.max_request_head_bytes == 0 {
        errors.push(ValidationError::NotPositive {
            field: "listener.max_request_head_bytes",
        });
    }
    if config.upstream.timeout_secs == Some(0) {
        errors.push(ValidationError::NotPositive { field: "upstream.timeout_secs" });
    }
    if config.upstream.connect_timeout_secs == Some(0) {
        errors.push(ValidationError::NotPositive {
            field: "upstream.connect_timeout_secs",
        });
    }
    if config.rewrite.word_length == 0 {
        errors.push(ValidationError::NotPositive { field: "rewrite.word_length" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_upstream_url(base_url: &str, errors: &mut Vec<ValidationError>) {
    if base_url.is_empty() {
        errors.push(ValidationError::Empty { field: "upstream.base_url" });
        return;
    }
    if let Err(e) = derive_upstream_host(base_url) {
        errors.push(ValidationError::UpstreamUrl(e.to_string()));
        return;
    }
    match Url::parse(base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::UpstreamUrl(format!(
            "unsupported scheme {:?}",
            url.scheme()
        ))),
        Err(e) => errors.push(ValidationError::UpstreamUrl(e.to_string())),
    }
}

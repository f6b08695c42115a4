//! Upstream origin access.
//!
//! # Data Flow
//! ```text
//! UserRequest (method, url, headers)
//!     → client.rs (filter headers, send, buffer body)
//!     → UpstreamResponse (status, reason, headers, decoded body)
//! ```

pub mod client;

pub use client::{ReqwestUpstream, UpstreamClient, UpstreamResponse};

//! Forward proxy that pins every request to one upstream origin and marks
//! fixed-length words in relayed HTML.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ http::session
//!                                      │
//!                                      ├─▶ http::framing   (read request head)
//!                                      ├─▶ http::request   (rewrite host, parse)
//!                                      ├─▶ http::response  ──▶ upstream::client ──▶ Upstream
//!                                      │       └─▶ rewrite::marker (text/html only)
//!                                      └─▶ http::framing   (frame relay response)
//!     Client ◀───────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rewrite;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;

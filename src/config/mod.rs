//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → shared via Arc to all components
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup and never mutated afterwards
//! - All fields have defaults except the upstream URL
//! - A bad upstream URL is a startup error, never a per-request one

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, ProxyConfig, RewriteConfig, UpstreamConfig};
pub use validation::{validate_config, ValidationError};

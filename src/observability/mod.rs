//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All components produce:
//!     → tracing events with structured fields (connection_id, method, url, status)
//!     → logging.rs (subscriber, level filter, stdout)
//! ```

pub mod logging;

pub use logging::init_logging;

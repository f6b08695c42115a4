//! Structured logging.
//!
//! # Design Decisions
//! - Uses the tracing crate with structured fields
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(level: &str) -> String {
    format!("marker_proxy={level},reqwest=warn", level = level)
}

/// Install the global subscriber. Calling it twice is a no-op.
pub fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_scopes_to_crate() {
        assert_eq!(default_filter("debug"), "marker_proxy=debug,reqwest=warn");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_logging("info");
        init_logging("debug");
    }
}

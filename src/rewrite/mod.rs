//! Content rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Raw request text
//!     → host.rs (proxy authority → upstream host)
//!
//! text/html response body
//!     → marker.rs (append marker after fixed-length words in text nodes)
//! ```

pub mod host;
pub mod marker;

pub use host::{derive_upstream_host, rewrite_host, HostRewrite, SubstringHostRewrite};
pub use marker::{apply_word_marker, charset_encoding, WordMarker};

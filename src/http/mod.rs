//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → session.rs (per-connection state machine)
//!     → framing.rs (read request head)
//!     → request.rs (rewrite host, parse UserRequest)
//!     → response.rs (dispatch upstream, transform body and headers)
//!     → framing.rs (build wire response)
//!     → Send to client
//! ```

pub mod framing;
pub mod request;
pub mod response;
pub mod server;
pub mod session;

pub use framing::Headers;
pub use request::{RequestRewriter, UserRequest};
pub use response::{HttpParts, ResponseTransformer};
pub use server::ProxyServer;
pub use session::{ProxySession, SessionContext, SessionState};

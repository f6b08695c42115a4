//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build server → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → Stop accepting → Finish in-flight sessions → Exit
//! ```

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownSignal};

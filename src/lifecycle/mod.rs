//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown
//!
//! Shutdown (shutdown.rs):
//!     Signal or trigger → stop accepting → drain requests → close node connection
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;

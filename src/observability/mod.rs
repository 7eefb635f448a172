//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! connection, tx monitor, tx guard, http boundary
//!     → logging.rs (structured events: nonce, status, category, connection_id)
//!     → metrics.rs (counters and the readiness gauge)
//! ```

pub mod logging;
pub mod metrics;

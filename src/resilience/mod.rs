//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the node:
//!     → timeouts.rs (every request, readiness wait and guarded submission has a deadline)
//! Connection attempt fails:
//!     → backoff.rs (exponential delay with jitter before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Submissions are never retried here; retry is a caller concern
//! - Only connection establishment retries, and only with jittered backoff

pub mod backoff;
pub mod timeouts;

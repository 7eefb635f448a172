//! Chain gateway library.
//!
//! HTTP gateway in front of a Substrate node: read-only queries and
//! transaction submission with status monitoring, dispatch error decoding and
//! per-category submission locks.

pub mod chain;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod tx;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;

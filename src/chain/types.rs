//! Chain-specific types and error definitions.

use thiserror::Error;

// Re-export NodeConfig from config module to avoid duplication
pub use crate::config::schema::NodeConfig;

/// Errors that can occur while talking to the node.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// No live connection to the node.
    #[error("Chain is offline, please connect a running chain.")]
    Offline,

    /// Establishing the WebSocket connection failed.
    #[error("Connection error: {0}")]
    Connect(String),

    /// The node answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The socket failed or produced an unreadable frame.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation exceeded its deadline.
    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    /// A node response did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The connection was closed while a request was outstanding.
    #[error("Connection closed")]
    Closed,

    /// The runtime error registry could not be loaded.
    #[error("Error registry unavailable: {0}")]
    Registry(String),

    /// Runtime metadata is missing, unsupported, or lacks an item.
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// The generic query route refused a method.
    #[error("Method '{0}' is not an allowed read-only query")]
    MethodNotAllowed(String),
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Decode(err.to_string())
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

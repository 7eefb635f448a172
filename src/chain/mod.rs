//! Node access.
//!
//! JSON-RPC over WebSocket, the connection lifecycle, runtime metadata and
//! SCALE decoding, typed queries and the runtime error registry.

pub mod api;
pub mod connection;
pub mod metadata;
pub mod pallets;
pub mod query;
pub mod registry;
pub mod rpc;
pub mod scale;
pub mod storage;
pub mod types;

pub use api::NodeApi;
pub use connection::{Connection, ConnectionId, ConnectionManager};
pub use metadata::{EventRecord, Phase, RuntimeInfo};
pub use query::{normalize, HeaderInfo, QueryResult, StorageValue, SystemHealth};
pub use registry::{ErrorMetadata, ErrorRegistry};
pub use rpc::{Connector, NodeClient, Subscription, WsConnector, WsRpcClient};
pub use storage::{account_id, AddressError};
pub use types::{ChainError, ChainResult};

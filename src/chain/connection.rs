//! Connection lifecycle management.
//!
//! # Responsibilities
//! - Own the single current connection to the node
//! - Connect in the background, retrying with backoff until ready
//! - Expose readiness (bootstrapped `NodeApi`) and liveness (socket open)
//! - Replace the current connection when the error boundary asks for it
//!
//! # State
//! ```text
//! Connecting ──connect + bootstrap──▶ Ready ──socket lost──▶ Not live
//!      │                                │                        │
//!      └────────────── close() ─────────┴──────── close() ───────┴──▶ Closed
//! ```
//! A closed connection is never reopened; `ConnectionManager::reinitialize`
//! installs a fresh one instead.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::chain::api::NodeApi;
use crate::chain::rpc::Connector;
use crate::chain::types::{ChainError, ChainResult, NodeConfig};
use crate::observability::metrics;
use crate::resilience::backoff::Backoff;
use crate::resilience::timeouts::race;

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// One connection to the node, ready or not.
pub struct Connection {
    id: ConnectionId,
    endpoint: String,
    ready_timeout: Duration,
    api: watch::Receiver<Option<Arc<NodeApi>>>,
    closed: AtomicBool,
    establish: Option<JoinHandle<()>>,
}

impl Connection {
    /// Start connecting in the background. Returns immediately.
    pub fn spawn(config: NodeConfig, connector: Arc<dyn Connector>) -> Self {
        let id = ConnectionId::new();
        let (api_tx, api_rx) = watch::channel(None);
        let endpoint = config.endpoint.clone();
        let ready_timeout = Duration::from_secs(config.ready_timeout_secs);

        tracing::info!(connection_id = %id, endpoint = %endpoint, "Connecting to node");
        let establish = tokio::spawn(establish(id, config, connector, api_tx));

        Self {
            id,
            endpoint,
            ready_timeout,
            api: api_rx,
            closed: AtomicBool::new(false),
            establish: Some(establish),
        }
    }

    /// A connection that is ready from the start.
    pub fn with_api(api: Arc<NodeApi>, ready_timeout: Duration) -> Self {
        let (_, api_rx) = watch::channel(Some(api));
        Self {
            id: ConnectionId::new(),
            endpoint: String::new(),
            ready_timeout,
            api: api_rx,
            closed: AtomicBool::new(false),
            establish: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// A bootstrapped API is available.
    pub fn is_ready(&self) -> bool {
        !self.is_closed() && self.api.borrow().is_some()
    }

    /// Ready and the socket is still open.
    pub fn is_connected(&self) -> bool {
        !self.is_closed()
            && self
                .api
                .borrow()
                .as_ref()
                .map(|api| api.is_connected())
                .unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The bootstrapped API, if ready. Does not wait.
    pub fn api(&self) -> Option<Arc<NodeApi>> {
        if self.is_closed() {
            return None;
        }
        self.api.borrow().clone()
    }

    /// Wait until the connection is ready, bounded by the ready timeout.
    pub async fn ready(&self) -> ChainResult<Arc<NodeApi>> {
        if self.is_closed() {
            return Err(ChainError::Offline);
        }

        let mut api = self.api.clone();
        let wait = async move {
            let ready = api
                .wait_for(Option::is_some)
                .await
                .map_err(|_| ChainError::Offline)?
                .clone();
            ready.ok_or(ChainError::Offline)
        };

        race(self.ready_timeout, wait).await.map_err(|_| ChainError::Offline)?
    }

    /// Stop connecting and close the socket if one is open.
    pub async fn close(&self) -> ChainResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(establish) = &self.establish {
            establish.abort();
        }

        let api = self.api.borrow().clone();
        if let Some(api) = api {
            api.client().close().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("ready", &self.is_ready())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(establish) = &self.establish {
            establish.abort();
        }
    }
}

async fn establish(
    id: ConnectionId,
    config: NodeConfig,
    connector: Arc<dyn Connector>,
    api_tx: watch::Sender<Option<Arc<NodeApi>>>,
) {
    let mut backoff = Backoff::from_config(&config);

    loop {
        match connector.connect(&config).await {
            Ok(client) => match NodeApi::bootstrap(client.clone(), &config).await {
                Ok(api) => {
                    tracing::info!(
                        connection_id = %id,
                        chain = %api.chain(),
                        spec_version = ?api.spec_version(),
                        "Current chain info"
                    );
                    metrics::record_node_ready(true);
                    let _ = api_tx.send(Some(Arc::new(api)));
                    return;
                }
                Err(e) => {
                    tracing::warn!(connection_id = %id, error = %e, "Node bootstrap failed");
                    let _ = client.close().await;
                }
            },
            Err(e) => {
                tracing::warn!(
                    connection_id = %id,
                    attempt = backoff.attempts() + 1,
                    error = %e,
                    "Connecting to node failed"
                );
            }
        }

        if api_tx.is_closed() {
            return;
        }
        tokio::time::sleep(backoff.next_delay()).await;
    }
}

/// Holds the process-wide current connection.
///
/// Only `reinitialize` replaces it; readers always see a whole connection.
pub struct ConnectionManager {
    config: NodeConfig,
    connector: Arc<dyn Connector>,
    current: ArcSwap<Connection>,
}

impl ConnectionManager {
    /// Create the manager and start the first connection.
    pub fn new(config: NodeConfig, connector: Arc<dyn Connector>) -> Self {
        let first = Connection::spawn(config.clone(), connector.clone());
        Self {
            config,
            connector,
            current: ArcSwap::from_pointee(first),
        }
    }

    /// The current connection, ready or not.
    pub fn current(&self) -> Arc<Connection> {
        self.current.load_full()
    }

    /// Close the current connection (best effort) and install a new one.
    pub fn reinitialize(&self) -> Arc<Connection> {
        let old = self.current();
        tracing::info!(connection_id = %old.id(), "Disconnecting from old connection");
        tokio::spawn(async move {
            let _ = old.close().await;
        });

        let fresh = Arc::new(Connection::spawn(self.config.clone(), self.connector.clone()));
        self.current.store(fresh.clone());
        metrics::record_node_ready(false);
        metrics::record_connection_reinit();
        tracing::warn!(connection_id = %fresh.id(), "Connection reinitialized");
        fresh
    }

    /// A ready API from the current connection.
    ///
    /// Fails with `ChainError::Offline` when the connection is closed, has lost
    /// its socket, or does not become ready in time.
    pub async fn ready_api(&self) -> ChainResult<Arc<NodeApi>> {
        let connection = self.current();
        if connection.is_closed() || (connection.is_ready() && !connection.is_connected()) {
            return Err(ChainError::Offline);
        }
        connection.ready().await
    }

    /// Close the current connection on shutdown.
    pub async fn shutdown(&self) {
        let connection = self.current();
        if let Err(e) = connection.close().await {
            tracing::debug!(connection_id = %connection.id(), error = %e, "Close on shutdown failed");
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.config.endpoint)
            .field("current", &self.current().id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::registry::ErrorRegistry;
    use crate::chain::rpc::{NodeClient, Subscription};
    use async_trait::async_trait;
    use serde_json::Value;

    struct StubClient {
        open: AtomicBool,
    }

    #[async_trait]
    impl NodeClient for StubClient {
        async fn request(&self, _method: &str, _params: Value) -> ChainResult<Value> {
            Ok(Value::Null)
        }

        async fn subscribe(
            &self,
            _method: &str,
            _params: Value,
            _unsubscribe_method: &str,
        ) -> ChainResult<Subscription> {
            Err(ChainError::Closed)
        }

        fn is_connected(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        async fn close(&self) -> ChainResult<()> {
            self.open.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn ready_connection() -> Connection {
        let client = Arc::new(StubClient {
            open: AtomicBool::new(true),
        });
        let api = NodeApi::new(client, ErrorRegistry::empty(), &NodeConfig::default());
        Connection::with_api(Arc::new(api), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn ready_connection_hands_out_api() {
        let connection = ready_connection();
        assert!(connection.is_ready());
        assert!(connection.is_connected());
        assert!(connection.ready().await.is_ok());
        assert!(connection.api().is_some());
    }

    #[tokio::test]
    async fn closed_connection_is_offline() {
        let connection = ready_connection();
        let api = connection.ready().await.unwrap();
        connection.close().await.unwrap();

        assert!(connection.is_closed());
        assert!(!connection.is_ready());
        assert!(!api.is_connected());
        assert!(connection.api().is_none());
        assert!(matches!(connection.ready().await, Err(ChainError::Offline)));
    }

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("node-"));
    }
}

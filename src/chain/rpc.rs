//! JSON-RPC 2.0 transport to the node over a WebSocket.
//!
//! # Responsibilities
//! - Open the socket with a connect timeout
//! - Correlate responses with requests by id
//! - Route subscription notifications to per-subscription channels
//! - Send the matching unsubscribe call when a `Subscription` is dropped
//! - Forget calls whose caller timed out, and unsubscribe right away when a
//!   subscription is confirmed after its caller gave up
//!
//! A single background task owns the socket. Callers talk to it through a
//! command channel, so the client handle is cheap to share.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::chain::types::{ChainError, ChainResult, NodeConfig};
use crate::resilience::timeouts::race;

/// Request/response and subscription access to a node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Issue a single JSON-RPC call.
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value>;

    /// Open a subscription. `unsubscribe_method` is called when the returned
    /// handle is dropped.
    async fn subscribe(
        &self,
        method: &str,
        params: Value,
        unsubscribe_method: &str,
    ) -> ChainResult<Subscription>;

    /// Whether the underlying channel is still open.
    fn is_connected(&self) -> bool;

    /// Close the channel. Outstanding calls fail with `ChainError::Closed`.
    async fn close(&self) -> ChainResult<()>;
}

/// Opens `NodeClient`s. The lifecycle manager goes through this seam so the
/// transport can be replaced.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &NodeConfig) -> ChainResult<Arc<dyn NodeClient>>;
}

type ReleaseFn = Box<dyn FnOnce(&str) + Send>;

/// A live subscription. Notifications arrive in the order the node sent them.
pub struct Subscription {
    id: String,
    notifications: mpsc::UnboundedReceiver<Value>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    pub fn new(id: impl Into<String>, notifications: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            id: id.into(),
            notifications,
            release: None,
        }
    }

    /// Register the action run once when this handle is dropped.
    pub fn on_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce(&str) + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    /// Subscription id assigned by the node.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next notification payload, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Value> {
        self.notifications.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

type SubscriptionReply = ChainResult<(String, mpsc::UnboundedReceiver<Value>)>;

enum Pending {
    Call(oneshot::Sender<ChainResult<Value>>),
    Subscribe {
        reply: oneshot::Sender<SubscriptionReply>,
        unsubscribe: String,
    },
}

impl Pending {
    fn fail(self, err: ChainError) {
        match self {
            Pending::Call(reply) => {
                let _ = reply.send(Err(err));
            }
            Pending::Subscribe { reply, .. } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

enum Command {
    Call { id: u64, payload: String, pending: Pending },
    /// The caller of `id` stopped waiting.
    Cancel { id: u64 },
    Unsubscribe { subscription: String, payload: String },
    Close,
}

/// WebSocket JSON-RPC client.
pub struct WsRpcClient {
    endpoint: String,
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl WsRpcClient {
    /// Connect to `config.endpoint` and start the socket task.
    pub async fn connect(config: &NodeConfig) -> ChainResult<Self> {
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let (socket, _) = race(connect_timeout, tokio_tungstenite::connect_async(config.endpoint.as_str()))
            .await
            .map_err(|_| ChainError::Timeout(config.connect_timeout_secs))?
            .map_err(|e| ChainError::Connect(e.to_string()))?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let next_id = Arc::new(AtomicU64::new(1));
        tokio::spawn(drive_socket(socket, command_rx, connected.clone(), next_id.clone()));

        tracing::debug!(endpoint = %config.endpoint, "WebSocket connected");

        Ok(Self {
            endpoint: config.endpoint.clone(),
            commands,
            next_id,
            connected,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn await_reply<T>(&self, id: u64, reply: oneshot::Receiver<ChainResult<T>>) -> ChainResult<T> {
        match race(self.request_timeout, reply).await {
            Ok(reply) => reply.map_err(|_| ChainError::Closed)?,
            Err(_) => {
                let _ = self.commands.send(Command::Cancel { id });
                Err(ChainError::Timeout(self.request_timeout.as_secs()))
            }
        }
    }
}

#[async_trait]
impl NodeClient for WsRpcClient {
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Call {
                id,
                payload: request_payload(id, method, params),
                pending: Pending::Call(tx),
            })
            .map_err(|_| ChainError::Closed)?;

        self.await_reply(id, rx).await
    }

    async fn subscribe(
        &self,
        method: &str,
        params: Value,
        unsubscribe_method: &str,
    ) -> ChainResult<Subscription> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Call {
                id,
                payload: request_payload(id, method, params),
                pending: Pending::Subscribe {
                    reply: tx,
                    unsubscribe: unsubscribe_method.to_string(),
                },
            })
            .map_err(|_| ChainError::Closed)?;

        let (subscription_id, notifications) = self.await_reply(id, rx).await?;

        let commands = self.commands.clone();
        let next_id = self.next_id.clone();
        let unsubscribe_method = unsubscribe_method.to_string();
        Ok(Subscription::new(subscription_id, notifications).on_release(move |sub_id| {
            let id = next_id.fetch_add(1, Ordering::Relaxed);
            // Socket may already be gone; nothing left to release then.
            let _ = commands.send(Command::Unsubscribe {
                subscription: sub_id.to_string(),
                payload: request_payload(id, &unsubscribe_method, json!([sub_id])),
            });
        }))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.commands.is_closed()
    }

    async fn close(&self) -> ChainResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.commands.send(Command::Close).map_err(|_| ChainError::Closed)
    }
}

impl fmt::Debug for WsRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsRpcClient")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Opens `WsRpcClient`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, config: &NodeConfig) -> ChainResult<Arc<dyn NodeClient>> {
        let client = WsRpcClient::connect(config).await?;
        Ok(Arc::new(client))
    }
}

fn request_payload(id: u64, method: &str, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string()
}

async fn drive_socket(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    connected: Arc<AtomicBool>,
    next_id: Arc<AtomicU64>,
) {
    let (mut sink, mut stream) = socket.split();
    let mut pending: HashMap<u64, Pending> = HashMap::new();
    let mut subscriptions: HashMap<String, mpsc::UnboundedSender<Value>> = HashMap::new();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Call { id, payload, pending: waiter }) => {
                    if let Err(e) = sink.send(Message::Text(payload.into())).await {
                        tracing::warn!(error = %e, "WebSocket send failed");
                        waiter.fail(ChainError::Transport(e.to_string()));
                        break;
                    }
                    pending.insert(id, waiter);
                }
                Some(Command::Cancel { id }) => cancel(&mut pending, id),
                Some(Command::Unsubscribe { subscription, payload }) => {
                    subscriptions.remove(&subscription);
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let orphaned = dispatch(text.as_str(), &mut pending, &mut subscriptions, &next_id);
                    if let Some(unsubscribe) = orphaned {
                        if sink.send(Message::Text(unsubscribe.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::warn!("Node closed the WebSocket");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WebSocket read failed");
                    break;
                }
            },
        }
    }

    connected.store(false, Ordering::SeqCst);
    for (_, waiter) in pending.drain() {
        waiter.fail(ChainError::Closed);
    }
}

/// Drop a timed-out call. Subscriptions stay tracked so a late
/// confirmation can still be unsubscribed.
fn cancel(pending: &mut HashMap<u64, Pending>, id: u64) {
    if matches!(pending.get(&id), Some(Pending::Call(_))) {
        pending.remove(&id);
        tracing::debug!(id, "Forgot timed-out request");
    }
}

/// Route one inbound frame to the waiting request or subscription.
///
/// Returns an unsubscribe payload to send when a subscription was confirmed
/// after its caller gave up.
fn dispatch(
    text: &str,
    pending: &mut HashMap<u64, Pending>,
    subscriptions: &mut HashMap<String, mpsc::UnboundedSender<Value>>,
    next_id: &AtomicU64,
) -> Option<String> {
    let message: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed frame from node");
            return None;
        }
    };

    if let Some(id) = message.get("id").and_then(Value::as_u64) {
        let Some(waiter) = pending.remove(&id) else {
            tracing::trace!(id, "Response for untracked request");
            return None;
        };
        let result = match message.get("error") {
            Some(error) => Err(rpc_error(error)),
            None => Ok(message.get("result").cloned().unwrap_or(Value::Null)),
        };
        match waiter {
            Pending::Call(reply) => {
                let _ = reply.send(result);
            }
            Pending::Subscribe { reply, unsubscribe } => {
                let registered = result.and_then(|v| subscription_key(&v)).map(|key| {
                    let (tx, rx) = mpsc::unbounded_channel();
                    subscriptions.insert(key.clone(), tx);
                    (key, rx)
                });
                if let Err(Ok((key, _))) = reply.send(registered) {
                    tracing::debug!(subscription = %key, "Subscription confirmed after its caller gave up");
                    subscriptions.remove(&key);
                    let id = next_id.fetch_add(1, Ordering::Relaxed);
                    return Some(request_payload(id, &unsubscribe, json!([key])));
                }
            }
        }
        return None;
    }

    let Some(params) = message.get("params") else {
        return None;
    };
    let Some(key) = params.get("subscription").and_then(|v| subscription_key(v).ok()) else {
        return None;
    };
    if let Some(tx) = subscriptions.get(&key) {
        let payload = params.get("result").cloned().unwrap_or(Value::Null);
        if tx.send(payload).is_err() {
            subscriptions.remove(&key);
        }
    }
    None
}

fn rpc_error(error: &Value) -> ChainError {
    ChainError::Rpc {
        code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    }
}

/// Nodes hand out subscription ids as strings or numbers.
fn subscription_key(value: &Value) -> ChainResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ChainError::Decode(format!("invalid subscription id: {}", other))),
    }
}

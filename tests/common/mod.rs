//! Shared utilities for integration testing: a scripted in-memory node.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use chain_gateway::chain::rpc::{Connector, NodeClient, Subscription};
use chain_gateway::chain::types::{ChainError, ChainResult};
use chain_gateway::chain::NodeApi;
use chain_gateway::config::NodeConfig;

pub mod runtime;

/// Node stand-in. Answers calls from a response table, serves storage by key
/// and feeds scripted status updates to each subscription.
pub struct MockNode {
    responses: Mutex<HashMap<String, Value>>,
    storage: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(String, Value)>>,
    scripts: Mutex<VecDeque<Vec<Value>>>,
    streams: Mutex<Vec<mpsc::UnboundedSender<Value>>>,
    submit_error: Mutex<Option<ChainError>>,
    subscriptions: AtomicUsize,
    unsubscribes: Arc<AtomicUsize>,
    connected: AtomicBool,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        let node = Self {
            responses: Mutex::new(HashMap::new()),
            storage: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            scripts: Mutex::new(VecDeque::new()),
            streams: Mutex::new(Vec::new()),
            submit_error: Mutex::new(None),
            subscriptions: AtomicUsize::new(0),
            unsubscribes: Arc::new(AtomicUsize::new(0)),
            connected: AtomicBool::new(true),
        };
        node.respond("system_chain", json!("Crust"));
        node.respond("state_getRuntimeVersion", json!({ "specName": "crust", "specVersion": 22 }));
        node.respond("chain_getBlockHash", json!("0xbest"));
        node.respond("chain_getHeader", json!({ "parentHash": "0x00", "number": "0x2a" }));
        node.respond(
            "system_health",
            json!({ "peers": 8, "isSyncing": false, "shouldHavePeers": true }),
        );
        node.respond("state_getMetadata", json!(runtime::metadata_hex()));
        node.respond("chain_getBlock", runtime::block());
        Arc::new(node)
    }

    pub fn respond(&self, method: &str, value: Value) {
        self.responses.lock().unwrap().insert(method.to_string(), value);
    }

    /// Answer `state_getStorage` for `key` (hex) with `value` (hex).
    pub fn respond_storage(&self, key: &str, value: impl Into<String>) {
        self.storage
            .lock()
            .unwrap()
            .insert(key.to_lowercase(), Value::String(value.into()));
    }

    /// `System.Events` of every block.
    pub fn set_events(&self, records: &[runtime::EventRecord]) {
        self.respond_storage(&runtime::events_key(), runtime::events_hex(records));
    }

    /// Blocks whose events were read.
    pub fn event_reads(&self) -> Vec<Value> {
        self.calls_to("chain_getBlock")
    }

    /// Statuses delivered as soon as the next subscription opens.
    pub fn script_statuses(&self, statuses: Vec<Value>) {
        self.scripts.lock().unwrap().push_back(statuses);
    }

    /// Push a status to every open subscription.
    pub fn push_status(&self, status: Value) {
        for stream in self.streams.lock().unwrap().iter() {
            let _ = stream.send(status.clone());
        }
    }

    /// End every open subscription stream.
    pub fn end_streams(&self) {
        self.streams.lock().unwrap().clear();
    }

    pub fn fail_next_submit(&self, error: ChainError) {
        *self.submit_error.lock().unwrap() = Some(error);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    pub fn unsubscribes(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        self.calls.lock().unwrap().push((method.to_string(), params.clone()));
        if method == "state_getStorage" {
            let key = params.get(0).and_then(Value::as_str).unwrap_or_default().to_lowercase();
            return Ok(self.storage.lock().unwrap().get(&key).cloned().unwrap_or(Value::Null));
        }
        self.responses
            .lock()
            .unwrap()
            .get(method)
            .cloned()
            .ok_or_else(|| ChainError::Rpc {
                code: -32601,
                message: "Method not found".into(),
            })
    }

    async fn subscribe(
        &self,
        method: &str,
        params: Value,
        _unsubscribe_method: &str,
    ) -> ChainResult<Subscription> {
        self.calls.lock().unwrap().push((method.to_string(), params));
        if let Some(error) = self.submit_error.lock().unwrap().take() {
            return Err(error);
        }

        let n = self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(script) = self.scripts.lock().unwrap().pop_front() {
            for status in script {
                let _ = tx.send(status);
            }
        }
        self.streams.lock().unwrap().push(tx);

        let unsubscribes = self.unsubscribes.clone();
        Ok(Subscription::new(format!("sub-{}", n), rx).on_release(move |_| {
            unsubscribes.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> ChainResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// One connection to the shared `MockNode`, with its own open/closed state.
pub struct MockSession {
    node: Arc<MockNode>,
    connected: AtomicBool,
}

#[async_trait]
impl NodeClient for MockSession {
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        if !self.is_connected() {
            return Err(ChainError::Closed);
        }
        self.node.request(method, params).await
    }

    async fn subscribe(
        &self,
        method: &str,
        params: Value,
        unsubscribe_method: &str,
    ) -> ChainResult<Subscription> {
        if !self.is_connected() {
            return Err(ChainError::Closed);
        }
        self.node.subscribe(method, params, unsubscribe_method).await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.node.is_connected()
    }

    async fn close(&self) -> ChainResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens a fresh `MockSession` to the same node on every connect.
pub struct MockConnector {
    node: Arc<MockNode>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(node: Arc<MockNode>) -> Arc<Self> {
        Arc::new(Self {
            node,
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _config: &NodeConfig) -> ChainResult<Arc<dyn NodeClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let session: Arc<dyn NodeClient> = Arc::new(MockSession {
            node: self.node.clone(),
            connected: AtomicBool::new(true),
        });
        Ok(session)
    }
}

pub fn node_config() -> NodeConfig {
    NodeConfig {
        endpoint: "ws://127.0.0.1:9944".into(),
        ready_timeout_secs: 2,
        reconnect_base_delay_ms: 10,
        reconnect_max_delay_ms: 50,
        ..NodeConfig::default()
    }
}

pub async fn bootstrap(node: &Arc<MockNode>) -> NodeApi {
    NodeApi::bootstrap(node.clone(), &node_config()).await.unwrap()
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

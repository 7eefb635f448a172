//! JSON-RPC client against a local WebSocket node.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use chain_gateway::chain::rpc::{NodeClient, WsRpcClient};
use chain_gateway::chain::types::ChainError;
use chain_gateway::config::NodeConfig;

mod common;
use common::eventually;

/// Start a single-connection node that answers a few methods. Every request
/// the node receives is forwarded to the returned channel.
async fn start_node(close_after_first: bool) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

        while let Some(Ok(frame)) = socket.next().await {
            let Message::Text(text) = frame else { continue };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            let _ = seen_tx.send(request.clone());
            if close_after_first {
                let _ = socket.close(None).await;
                return;
            }

            let id = request["id"].clone();
            let mut replies = Vec::new();
            match request["method"].as_str().unwrap_or_default() {
                "system_health" => replies.push(json!({
                    "jsonrpc": "2.0", "id": id,
                    "result": { "peers": 3, "isSyncing": false, "shouldHavePeers": true }
                })),
                "author_submitAndWatchExtrinsic" => {
                    replies.push(json!({ "jsonrpc": "2.0", "id": id, "result": "sub-1" }));
                    for status in [json!("ready"), json!({ "inBlock": "0xblock" })] {
                        replies.push(json!({
                            "jsonrpc": "2.0",
                            "method": "author_extrinsicUpdate",
                            "params": { "subscription": "sub-1", "result": status }
                        }));
                    }
                }
                "author_unwatchExtrinsic" => {
                    replies.push(json!({ "jsonrpc": "2.0", "id": id, "result": true }))
                }
                _ => replies.push(json!({
                    "jsonrpc": "2.0", "id": id,
                    "error": { "code": -32601, "message": "Method not found" }
                })),
            }
            for reply in replies {
                if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
                    return;
                }
            }
        }
    });

    (format!("ws://{}", addr), seen_rx)
}

fn config(endpoint: String) -> NodeConfig {
    NodeConfig {
        endpoint,
        connect_timeout_secs: 2,
        request_timeout_secs: 2,
        ..NodeConfig::default()
    }
}

#[tokio::test]
async fn test_request_and_rpc_error() {
    let (endpoint, _seen) = start_node(false).await;
    let client = WsRpcClient::connect(&config(endpoint)).await.unwrap();
    assert!(client.is_connected());

    let health = client.request("system_health", json!([])).await.unwrap();
    assert_eq!(health["peers"], 3);

    let err = client.request("author_rotateKeys", json!([])).await.unwrap_err();
    assert!(matches!(err, ChainError::Rpc { code: -32601, .. }));
}

#[tokio::test]
async fn test_subscription_order_and_unwatch() {
    let (endpoint, mut seen) = start_node(false).await;
    let client = WsRpcClient::connect(&config(endpoint)).await.unwrap();

    let mut subscription = client
        .subscribe("author_submitAndWatchExtrinsic", json!(["0x00"]), "author_unwatchExtrinsic")
        .await
        .unwrap();
    assert_eq!(subscription.id(), "sub-1");
    assert_eq!(subscription.next().await, Some(json!("ready")));
    assert_eq!(subscription.next().await, Some(json!({ "inBlock": "0xblock" })));

    drop(subscription);

    let submitted = seen.recv().await.unwrap();
    assert_eq!(submitted["method"], "author_submitAndWatchExtrinsic");
    let unwatch = tokio::time::timeout(Duration::from_secs(2), seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unwatch["method"], "author_unwatchExtrinsic");
    assert_eq!(unwatch["params"], json!(["sub-1"]));
}

/// A node that confirms subscriptions only after `delay`.
async fn start_slow_node(delay: Duration) -> (String, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = tokio_tungstenite::accept_async(stream).await.unwrap();

        while let Some(Ok(frame)) = socket.next().await {
            let Message::Text(text) = frame else { continue };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            let _ = seen_tx.send(request.clone());

            let result = match request["method"].as_str().unwrap_or_default() {
                "author_submitAndWatchExtrinsic" => {
                    tokio::time::sleep(delay).await;
                    json!("sub-late")
                }
                _ => json!(true),
            };
            let reply = json!({ "jsonrpc": "2.0", "id": request["id"], "result": result });
            if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
                return;
            }
        }
    });

    (format!("ws://{}", addr), seen_rx)
}

#[tokio::test]
async fn test_late_subscription_is_unwatched() {
    let (endpoint, mut seen) = start_slow_node(Duration::from_millis(1500)).await;
    let client = WsRpcClient::connect(&NodeConfig {
        request_timeout_secs: 1,
        ..config(endpoint)
    })
    .await
    .unwrap();

    let err = client
        .subscribe("author_submitAndWatchExtrinsic", json!(["0x00"]), "author_unwatchExtrinsic")
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Timeout(1)));

    let submitted = seen.recv().await.unwrap();
    assert_eq!(submitted["method"], "author_submitAndWatchExtrinsic");
    let unwatch = tokio::time::timeout(Duration::from_secs(3), seen.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unwatch["method"], "author_unwatchExtrinsic");
    assert_eq!(unwatch["params"], json!(["sub-late"]));
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_node_close_fails_pending_calls() {
    let (endpoint, _seen) = start_node(true).await;
    let client = WsRpcClient::connect(&config(endpoint)).await.unwrap();

    let err = client.request("system_health", json!([])).await.unwrap_err();
    assert!(matches!(err, ChainError::Closed));
    assert!(eventually(|| !client.is_connected()).await);
}

#[tokio::test]
async fn test_close_marks_disconnected() {
    let (endpoint, _seen) = start_node(false).await;
    let client = WsRpcClient::connect(&config(endpoint)).await.unwrap();
    client.close().await.unwrap();
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = WsRpcClient::connect(&config(format!("ws://{}", addr)))
        .await
        .unwrap_err();
    assert!(matches!(err, ChainError::Connect(_)));
}

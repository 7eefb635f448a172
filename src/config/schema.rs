//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the chain gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Remote node connection settings.
    pub node: NodeConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Guarded transaction categories.
    pub tx_lock: TxLockConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Apply command-line overrides: a listen port and a node endpoint.
    ///
    /// The port replaces the port of `listener.bind_address`, keeping its host.
    pub fn apply_overrides(&mut self, port: Option<u16>, endpoint: Option<String>) {
        if let Some(port) = port {
            let host = self
                .listener
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host)
                .unwrap_or("0.0.0.0");
            self.listener.bind_address = format!("{}:{}", host, port);
        }
        if let Some(endpoint) = endpoint {
            self.node.endpoint = endpoint;
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:56667").
    pub bind_address: String,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:56667".to_string(),
            max_body_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Remote node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// WebSocket JSON-RPC endpoint of the node.
    pub endpoint: String,

    /// Timeout for a single connection attempt in seconds.
    pub connect_timeout_secs: u64,

    /// Timeout for a single RPC request in seconds.
    pub request_timeout_secs: u64,

    /// How long a request waits for the connection to become ready.
    pub ready_timeout_secs: u64,

    /// Base delay between reconnection attempts.
    pub reconnect_base_delay_ms: u64,

    /// Upper bound for the reconnection delay.
    pub reconnect_max_delay_ms: u64,

    /// JSON file overriding the error registry built from runtime metadata.
    pub error_registry_path: Option<String>,

    /// Method name prefixes accepted by the generic state query route.
    pub query_method_prefixes: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://rpc.crust.network/".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            ready_timeout_secs: 30,
            reconnect_base_delay_ms: 500,
            reconnect_max_delay_ms: 10_000,
            error_registry_path: None,
            query_method_prefixes: vec![
                "chain_".to_string(),
                "state_".to_string(),
                "system_".to_string(),
            ],
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall per-request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 600 }
    }
}

/// Transaction lock configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TxLockConfig {
    /// Transaction categories allowed at most one in-flight submission.
    pub categories: Vec<String>,

    /// How long a guarded submission is waited for, in seconds.
    pub timeout_secs: u64,
}

impl Default for TxLockConfig {
    fn default() -> Self {
        Self {
            categories: vec!["swork".to_string()],
            // 7 min, for valid till checking
            timeout_secs: 7 * 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:56667");
        assert_eq!(config.timeouts.request_secs, 600);
        assert_eq!(config.tx_lock.categories, vec!["swork".to_string()]);
        assert_eq!(config.tx_lock.timeout_secs, 420);
        assert!(config.node.error_registry_path.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [node]
            endpoint = "ws://127.0.0.1:9944"

            [tx_lock]
            categories = ["swork", "market"]
            "#,
        )
        .unwrap();

        assert_eq!(config.node.endpoint, "ws://127.0.0.1:9944");
        assert_eq!(config.node.request_timeout_secs, 30);
        assert_eq!(config.tx_lock.categories.len(), 2);
        assert_eq!(config.tx_lock.timeout_secs, 420);
    }

    #[test]
    fn test_overrides() {
        let mut config = GatewayConfig::default();
        config.apply_overrides(Some(8080), Some("ws://127.0.0.1:9944".into()));
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.node.endpoint, "ws://127.0.0.1:9944");

        config.apply_overrides(None, None);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}

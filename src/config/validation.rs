//! Configuration validation.
//!
//! Semantic checks only; serde already rejected malformed documents.
//! All problems are reported at once rather than stopping at the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("node.endpoint '{0}' must be a ws:// or wss:// URL")]
    Endpoint(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("tx_lock.categories contains an empty name")]
    EmptyCategory,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    match url::Url::parse(&config.node.endpoint) {
        Ok(url) if matches!(url.scheme(), "ws" | "wss") => {}
        _ => errors.push(ValidationError::Endpoint(config.node.endpoint.clone())),
    }

    let positive = [
        ("node.connect_timeout_secs", config.node.connect_timeout_secs),
        ("node.request_timeout_secs", config.node.request_timeout_secs),
        ("node.ready_timeout_secs", config.node.ready_timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("tx_lock.timeout_secs", config.tx_lock.timeout_secs),
    ];
    for (name, value) in positive {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(name));
        }
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroValue("listener.max_body_bytes"));
    }

    if config.tx_lock.categories.iter().any(|c| c.trim().is_empty()) {
        errors.push(ValidationError::EmptyCategory);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.node.endpoint = "http://localhost:9933".into();
        config.tx_lock.timeout_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroValue("tx_lock.timeout_secs")));
    }
}

//! Structured logging.
//!
//! `RUST_LOG` wins over the configured level. JSON output is for log
//! shippers; the default is the human-readable formatter.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter used when `RUST_LOG` is not set.
pub fn default_directives(level: &str) -> String {
    format!("chain_gateway={level},tower_http={level},warn")
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let json = config.log_json.then(|| fmt::layer().json().with_current_span(true));
    let plain = (!config.log_json).then(fmt::layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .try_init()
}

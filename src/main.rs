//! Chain gateway.
//!
//! ```text
//! HTTP request
//!     → http handlers
//!         → queries ─────────────────────────────┐
//!         → tx guard (per-category lock)          │
//!             → tx monitor (submit, watch, decode) │
//!                                                  ▼
//!                     chain: ConnectionManager → NodeApi ⇄ node (JSON-RPC / WS)
//!     ← error boundary (log, reinitialize connection)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use chain_gateway::chain::rpc::WsConnector;
use chain_gateway::config::{load_config, validation::validate_config, GatewayConfig};
use chain_gateway::http::{AppState, GatewayServer};
use chain_gateway::lifecycle::Shutdown;
use chain_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "chain-gateway")]
#[command(about = "HTTP gateway for a Substrate node", long_about = None)]
struct Args {
    /// Listen port; overrides the configured bind address port.
    port: Option<u16>,

    /// Node WebSocket endpoint, e.g. ws://127.0.0.1:9944
    endpoint: Option<String>,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    config.apply_overrides(args.port, args.endpoint);
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("Invalid configuration: {}", error);
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "chain-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        endpoint = %config.node.endpoint,
        request_timeout_secs = config.timeouts.request_secs,
        guarded_categories = ?config.tx_lock.categories,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let state = AppState::new(&config, Arc::new(WsConnector));
    let server = GatewayServer::new(&config, state);
    let shutdown = Shutdown::new();
    server.run(listener, shutdown.wait()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

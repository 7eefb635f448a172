//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all gateway routes
//! - Wire up middleware (request id, tracing, body limit, panic catcher,
//!   error boundary with the request timeout)
//! - Serve until shutdown, then close the node connection

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::chain::connection::ConnectionManager;
use crate::chain::rpc::Connector;
use crate::config::GatewayConfig;
use crate::http::handlers;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::http::response::{error_boundary, handle_panic};
use crate::tx::guard::TxLocker;
use crate::tx::signer::{PresignedSigner, Signer};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionManager>,
    pub locker: Arc<TxLocker>,
    pub signer: Arc<dyn Signer>,
    /// Budget for a whole request, enforced by the error boundary.
    pub request_timeout: Duration,
}

impl AppState {
    /// Start the first node connection and build the shared state.
    pub fn new(config: &GatewayConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            connections: Arc::new(ConnectionManager::new(config.node.clone(), connector)),
            locker: Arc::new(TxLocker::from_config(&config.tx_lock)),
            signer: Arc::new(PresignedSigner),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = signer;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP front of the gateway.
pub struct GatewayServer {
    router: Router,
    state: AppState,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig, state: AppState) -> Self {
        let router = build_router(config, state.clone());
        Self { router, state }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.state.connections.shutdown().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    Router::new()
        .route("/api/v1/block/header", get(handlers::block_header))
        .route("/api/v1/block/hash", get(handlers::block_hash))
        .route("/api/v1/system/health", get(handlers::system_health))
        .route("/api/v1/state/query", post(handlers::state_query))
        .route("/api/v1/tx", post(handlers::submit_tx))
        .route(
            "/api/v1/swork/workreport",
            get(handlers::swork_work_report).post(handlers::swork_report_works),
        )
        .route(
            "/api/v1/swork/identity",
            get(handlers::swork_identity).post(handlers::swork_register),
        )
        .route("/api/v1/swork/code", get(handlers::swork_code))
        .route("/api/v1/market/file", get(handlers::market_file))
        .route("/api/v1/market/fileBalance", get(handlers::market_file_balance))
        .route("/api/v1/market/staking", get(handlers::market_staking))
        .route("/api/v1/gateway/status", get(handlers::gateway_status))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(state.clone(), error_boundary))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<axum::body::Body>))
        .layer(set_request_id_layer())
}

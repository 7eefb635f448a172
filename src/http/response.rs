//! Error responses and the error boundary.
//!
//! Every handler error renders as `{status: "error", message}` and carries a
//! `BoundaryFailure` marker in its extensions. The boundary middleware logs
//! marked responses and replaces the node connection, so a broken connection
//! never outlives the request that hit it. The boundary also owns the request
//! timeout, so a request that runs out of time is handled like any other
//! failure.

use std::any::Any;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::chain::types::ChainError;
use crate::http::server::AppState;
use crate::resilience::timeouts::race;
use crate::tx::types::{TxError, TxOutcome};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed client input. Never reinitializes the connection.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Tx(#[from] TxError),

    /// The request outlived `timeouts.request_secs`.
    #[error("Response timeout")]
    ResponseTimeout,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn reinitializes(&self) -> bool {
        !matches!(self, ApiError::BadRequest(_))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: &'static str,
    message: String,
}

/// Marker left on error responses for the boundary.
#[derive(Debug, Clone)]
pub struct BoundaryFailure {
    pub message: String,
    pub reinitialize: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let failure = BoundaryFailure {
            message: message.clone(),
            reinitialize: self.reinitializes(),
        };

        let mut response = (
            self.status_code(),
            Json(ErrorBody {
                status: "error",
                message,
            }),
        )
            .into_response();
        response.extensions_mut().insert(failure);
        response
    }
}

/// Success outcomes answer 200, failed ones 400.
pub fn outcome_response(outcome: TxOutcome) -> Response {
    let status = if outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome)).into_response()
}

/// Bound the request by the configured timeout, log failed requests and
/// reinitialize the node connection.
pub async fn error_boundary(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = match race(state.request_timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => ApiError::ResponseTimeout.into_response(),
    };

    if let Some(failure) = response.extensions().get::<BoundaryFailure>() {
        if failure.reinitialize {
            tracing::error!(
                method = %method,
                path = %path,
                error = %failure.message,
                "Request failed, reinitializing node connection"
            );
            state.connections.reinitialize();
        } else {
            tracing::debug!(method = %method, path = %path, error = %failure.message, "Bad request");
        }
    }
    response
}

/// Panic handler for `CatchPanicLayer`. The panic is reported like any
/// other internal error so the boundary still sees it.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("Handler panicked: {}", detail)).into_response()
}

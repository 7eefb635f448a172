//! Gateway route handlers.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::chain::query::{PlainValue, QueryResult};
use crate::chain::storage::account_id;
use crate::chain::types::ChainError;
use crate::http::response::{outcome_response, ApiError};
use crate::http::server::AppState;
use crate::tx::monitor::TxSubmitter;
use crate::tx::types::{Extrinsic, Transaction};

/// Category forced on the sWorker routes.
pub const SWORK_CATEGORY: &str = "swork";

#[derive(Debug, Deserialize)]
pub struct BlockHashParams {
    #[serde(rename = "blockNumber")]
    pub block_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddressParams {
    pub address: Option<String>,
}

impl AddressParams {
    fn account(&self) -> Result<[u8; 32], ApiError> {
        let address = self
            .address
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("address is required".into()))?;
        account_id(address).map_err(|e| ApiError::BadRequest(format!("Invalid address: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
pub struct FileParams {
    pub cid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StateQueryRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitRequest {
    pub kind: String,
    pub nonce: u64,
    /// Signed extrinsic, `0x` hex.
    pub extrinsic: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub connection_id: String,
    pub endpoint: String,
    pub ready: bool,
    pub connected: bool,
    pub chain: Option<String>,
    pub spec_version: Option<u64>,
    pub held_locks: Vec<String>,
    pub version: &'static str,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub async fn block_header(State(state): State<AppState>) -> Result<Json<PlainValue>, ApiError> {
    let api = state.connections.ready_api().await?;
    let header = api.header().await?;
    Ok(Json(QueryResult::Header(header).into_plain()?))
}

pub async fn block_hash(
    State(state): State<AppState>,
    Query(params): Query<BlockHashParams>,
) -> Result<Json<PlainValue>, ApiError> {
    let number = params
        .block_number
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("blockNumber is required".into()))?
        .parse::<u64>()
        .map_err(|e| ApiError::BadRequest(format!("Invalid blockNumber: {}", e)))?;

    let api = state.connections.ready_api().await?;
    let hash = api.block_hash(number).await?;
    Ok(Json(QueryResult::BlockHash(hash).into_plain()?))
}

pub async fn system_health(State(state): State<AppState>) -> Result<Json<PlainValue>, ApiError> {
    let api = state.connections.ready_api().await?;
    let health = api.health().await?;
    Ok(Json(QueryResult::Health(health).into_plain()?))
}

pub async fn state_query(
    State(state): State<AppState>,
    body: Result<Json<StateQueryRequest>, JsonRejection>,
) -> Result<Json<PlainValue>, ApiError> {
    let request = json_body(body)?;
    let params = if request.params.is_null() {
        json!([])
    } else {
        request.params
    };

    let api = state.connections.ready_api().await?;
    let result = api.query(&request.method, params).await.map_err(|e| match e {
        not_allowed @ ChainError::MethodNotAllowed(_) => ApiError::BadRequest(not_allowed.to_string()),
        other => ApiError::Chain(other),
    })?;
    Ok(Json(result.into_plain()?))
}

pub async fn swork_identity(
    State(state): State<AppState>,
    Query(params): Query<AddressParams>,
) -> Result<Json<PlainValue>, ApiError> {
    let account = params.account()?;
    let api = state.connections.ready_api().await?;
    let identity = api.swork_identity(&account).await?;
    Ok(Json(QueryResult::Identity(identity).into_plain()?))
}

pub async fn swork_work_report(
    State(state): State<AppState>,
    Query(params): Query<AddressParams>,
) -> Result<Json<PlainValue>, ApiError> {
    let account = params.account()?;
    let api = state.connections.ready_api().await?;
    let report = api.swork_work_report(&account).await?;
    Ok(Json(QueryResult::WorkReport(report).into_plain()?))
}

pub async fn swork_code(State(state): State<AppState>) -> Result<Json<PlainValue>, ApiError> {
    let api = state.connections.ready_api().await?;
    let code = api.swork_code().await?;
    Ok(Json(QueryResult::Code(code).into_plain()?))
}

pub async fn market_file(
    State(state): State<AppState>,
    Query(params): Query<FileParams>,
) -> Result<Json<PlainValue>, ApiError> {
    let cid = params
        .cid
        .filter(|cid| !cid.is_empty())
        .ok_or_else(|| ApiError::BadRequest("cid is required".into()))?;

    tracing::info!(cid = %cid, "Query file order");
    let api = state.connections.ready_api().await?;
    let file = api.market_file(&cid).await?;
    Ok(Json(QueryResult::File(file).into_plain()?))
}

pub async fn market_file_balance(State(state): State<AppState>) -> Result<Json<PlainValue>, ApiError> {
    let api = state.connections.ready_api().await?;
    let balance = api.market_file_base_fee().await?;
    Ok(Json(QueryResult::FileBalance { balance }.into_plain()?))
}

pub async fn market_staking(State(state): State<AppState>) -> Result<Json<PlainValue>, ApiError> {
    let api = state.connections.ready_api().await?;
    let data = api.next_fee_multiplier().await?;
    Ok(Json(QueryResult::Staking { data }.into_plain()?))
}

pub async fn submit_tx(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(body)?;
    let category = request.category.clone();
    submit(state, request, category).await
}

pub async fn swork_report_works(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(body)?;
    submit(state, request, Some(SWORK_CATEGORY.to_string())).await
}

pub async fn swork_register(
    State(state): State<AppState>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(body)?;
    submit(state, request, Some(SWORK_CATEGORY.to_string())).await
}

async fn submit(
    state: AppState,
    request: SubmitRequest,
    category: Option<String>,
) -> Result<Response, ApiError> {
    let extrinsic = Extrinsic::from_hex(&request.extrinsic)
        .map_err(|e| ApiError::BadRequest(format!("Invalid extrinsic hex: {}", e)))?;
    let tx = Transaction::new(request.kind, request.nonce, extrinsic.as_bytes().to_vec());

    let api = state.connections.ready_api().await?;
    let signer = state.signer.clone();
    let category = category.unwrap_or_default();

    tracing::info!(kind = %tx.kind, nonce = tx.nonce, category = %category, "Sending transaction");
    let outcome = state
        .locker
        .guarded(&category, move || async move {
            TxSubmitter::submit(&api, &tx, signer.as_ref()).await
        })
        .await?;

    Ok(outcome_response(outcome))
}

pub async fn gateway_status(State(state): State<AppState>) -> Json<GatewayStatus> {
    let connection = state.connections.current();
    let api = connection.api();

    Json(GatewayStatus {
        connection_id: connection.id().to_string(),
        endpoint: connection.endpoint().to_string(),
        ready: connection.is_ready(),
        connected: connection.is_connected(),
        chain: api.as_ref().map(|api| api.chain().to_string()),
        spec_version: api.as_ref().and_then(|api| api.spec_version()),
        held_locks: state.locker.held_locks(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

//! Transaction, status and outcome types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::chain::types::ChainError;
use crate::tx::signer::SignerError;

pub const SYSTEM_SECTION: &str = "system";
pub const EXTRINSIC_FAILED: &str = "ExtrinsicFailed";
pub const EXTRINSIC_SUCCESS: &str = "ExtrinsicSuccess";

/// Details returned when a guarded category is already busy.
pub const TX_LOCKED: &str = "Tx Locked";

/// A pre-built operation handed to the gateway by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Human-readable type tag, e.g. `balances.transfer`. Used for logging.
    pub kind: String,
    pub nonce: u64,
    /// Encoded call or, for pre-signed submissions, the signed extrinsic.
    pub payload: Vec<u8>,
}

impl Transaction {
    pub fn new(kind: impl Into<String>, nonce: u64, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            nonce,
            payload,
        }
    }
}

/// Signed, encoded extrinsic bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Extrinsic(Vec<u8>);

impl Extrinsic {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Parse `0x`-prefixed (or bare) hex.
    pub fn from_hex(encoded: &str) -> Result<Self, hex::FromHexError> {
        let digits = encoded.strip_prefix("0x").unwrap_or(encoded);
        hex::decode(digits).map(Self)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Extrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Extrinsic({} bytes)", self.0.len())
    }
}

/// Status kind, named as the node names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TxStatusKind {
    Future,
    Ready,
    Broadcast,
    InBlock,
    Retracted,
    FinalityTimeout,
    Finalized,
    Usurped,
    Dropped,
    Invalid,
}

impl TxStatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatusKind::Future => "Future",
            TxStatusKind::Ready => "Ready",
            TxStatusKind::Broadcast => "Broadcast",
            TxStatusKind::InBlock => "InBlock",
            TxStatusKind::Retracted => "Retracted",
            TxStatusKind::FinalityTimeout => "FinalityTimeout",
            TxStatusKind::Finalized => "Finalized",
            TxStatusKind::Usurped => "Usurped",
            TxStatusKind::Dropped => "Dropped",
            TxStatusKind::Invalid => "Invalid",
        }
    }
}

impl fmt::Display for TxStatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status update pushed by `author_submitAndWatchExtrinsic`.
///
/// Matches the node's JSON encoding: `"ready"`, `{"inBlock": "0x.."}`, ...
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TxStatus {
    Future,
    Ready,
    Broadcast(Vec<String>),
    InBlock(String),
    Retracted(String),
    FinalityTimeout(String),
    Finalized(String),
    Usurped(String),
    Dropped,
    Invalid,
}

impl TxStatus {
    pub fn from_json(value: Value) -> Result<Self, ChainError> {
        serde_json::from_value(value)
            .map_err(|e| ChainError::Decode(format!("transaction status: {}", e)))
    }

    pub fn kind(&self) -> TxStatusKind {
        match self {
            TxStatus::Future => TxStatusKind::Future,
            TxStatus::Ready => TxStatusKind::Ready,
            TxStatus::Broadcast(_) => TxStatusKind::Broadcast,
            TxStatus::InBlock(_) => TxStatusKind::InBlock,
            TxStatus::Retracted(_) => TxStatusKind::Retracted,
            TxStatus::FinalityTimeout(_) => TxStatusKind::FinalityTimeout,
            TxStatus::Finalized(_) => TxStatusKind::Finalized,
            TxStatus::Usurped(_) => TxStatusKind::Usurped,
            TxStatus::Dropped => TxStatusKind::Dropped,
            TxStatus::Invalid => TxStatusKind::Invalid,
        }
    }

    /// The node gave up on the transaction.
    pub fn is_rejection(&self) -> bool {
        matches!(self, TxStatus::Invalid | TxStatus::Dropped | TxStatus::Usurped(_))
    }
}

/// An event emitted by the extrinsic in its block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicEvent {
    pub section: String,
    pub method: String,
    #[serde(default)]
    pub data: Value,
}

impl ExtrinsicEvent {
    pub fn is_failure(&self) -> bool {
        self.section == SYSTEM_SECTION && self.method == EXTRINSIC_FAILED
    }

    pub fn is_success(&self) -> bool {
        self.method == EXTRINSIC_SUCCESS
    }
}

/// Reference to a dispatch error as carried by `ExtrinsicFailed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchErrorRef {
    /// Error declared by a runtime module.
    Module { index: u8, error: u8 },
    /// Any other dispatch error, by variant name (`BadOrigin`, `Token`, ...).
    Other(String),
}

impl DispatchErrorRef {
    /// Parse the dispatch error from `ExtrinsicFailed` event data
    /// (`[dispatchError, dispatchInfo]`).
    pub fn from_event_data(data: &Value) -> Result<Self, ChainError> {
        let error = match data {
            Value::Array(items) => items
                .first()
                .ok_or_else(|| ChainError::Decode("ExtrinsicFailed without data".into()))?,
            other => other,
        };

        match error {
            Value::String(reason) => Ok(DispatchErrorRef::Other(reason.clone())),
            Value::Object(map) if map.len() == 1 => {
                let (variant, inner) = map.iter().next().ok_or_else(|| {
                    ChainError::Decode("empty dispatch error".into())
                })?;
                if variant.eq_ignore_ascii_case("module") {
                    parse_module_error(inner)
                } else {
                    Ok(DispatchErrorRef::Other(pascal_case(variant)))
                }
            }
            other => Err(ChainError::Decode(format!("unrecognized dispatch error: {}", other))),
        }
    }

    /// The dispatch error's variant name.
    pub fn kind(&self) -> &str {
        match self {
            DispatchErrorRef::Module { .. } => "Module",
            DispatchErrorRef::Other(reason) => reason,
        }
    }
}

fn parse_module_error(inner: &Value) -> Result<DispatchErrorRef, ChainError> {
    let index = inner
        .get("index")
        .and_then(Value::as_u64)
        .and_then(|i| u8::try_from(i).ok())
        .ok_or_else(|| ChainError::Decode(format!("module error index: {}", inner)))?;

    // Older runtimes send a plain number, newer ones four bytes (hex or array)
    // whose first byte is the error index.
    let error = match inner.get("error") {
        Some(Value::Number(n)) => n.as_u64().and_then(|e| u8::try_from(e).ok()),
        Some(Value::String(s)) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            hex::decode(digits).ok().and_then(|bytes| bytes.first().copied())
        }
        Some(Value::Array(bytes)) => bytes
            .first()
            .and_then(Value::as_u64)
            .and_then(|e| u8::try_from(e).ok()),
        _ => None,
    }
    .ok_or_else(|| ChainError::Decode(format!("module error code: {}", inner)))?;

    Ok(DispatchErrorRef::Module { index, error })
}

fn pascal_case(variant: &str) -> String {
    let mut chars = variant.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether a submission went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// Result handed back to the caller of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl TxOutcome {
    pub fn success() -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: None,
            details: None,
        }
    }

    pub fn failed(message: Option<String>, details: Option<String>) -> Self {
        Self {
            status: OutcomeStatus::Failed,
            message,
            details,
        }
    }

    /// Outcome for a guarded category that is already in use.
    pub fn locked() -> Self {
        Self::failed(None, Some(TX_LOCKED.to_string()))
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Why a submission did not produce an outcome.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("Signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error(transparent)]
    Submission(#[from] ChainError),

    /// The node reported `Invalid`, `Dropped` or `Usurped`.
    #[error("{0}")]
    Rejected(TxStatusKind),

    #[error("Transaction timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Status stream ended before the transaction was included")]
    StreamClosed,

    #[error("Transaction task aborted: {0}")]
    Aborted(String),
}

pub type TxResult<T> = Result<T, TxError>;

//! Query result normalization.
//!
//! Node responses are turned into plain JSON before they leave the gateway.
//! Known query shapes get a typed form; anything else passes through the
//! `Raw` escape hatch as a structural copy.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::types::{ChainError, ChainResult};

/// Plain, re-serializable data.
pub type PlainValue = Value;

/// Convert any serializable value into plain JSON.
///
/// Lossless structural copy; fails only when the value has no JSON form
/// (for example a map keyed by non-strings).
pub fn normalize<T>(raw: &T) -> ChainResult<PlainValue>
where
    T: Serialize + ?Sized,
{
    serde_json::to_value(raw).map_err(ChainError::from)
}

/// Read a node response as one of the typed shapes.
pub fn decode_shape<T: DeserializeOwned>(raw: Value) -> ChainResult<T> {
    serde_json::from_value(raw).map_err(ChainError::from)
}

/// Latest block header summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub number: u64,
    pub hash: String,
}

/// `system_health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub peers: u64,
    pub is_syncing: bool,
    pub should_have_peers: bool,
}

/// Header as encoded by `chain_getHeader`; only the fields the gateway uses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawHeader {
    pub number: String,
}

impl RawHeader {
    /// Block numbers arrive hex encoded.
    pub fn block_number(&self) -> ChainResult<u64> {
        let digits = self.number.trim_start_matches("0x");
        u64::from_str_radix(digits, 16)
            .map_err(|e| ChainError::Decode(format!("block number '{}': {}", self.number, e)))
    }
}

/// A decoded storage read from the generic query route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageValue {
    pub pallet: String,
    pub entry: String,
    pub value: Value,
}

/// Result of a read-only query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Header(HeaderInfo),
    BlockHash(String),
    Health(SystemHealth),
    /// `Swork.Identities` of an account, `null` when unregistered.
    Identity(Option<Value>),
    /// Latest work report of an account's anchor.
    WorkReport(Option<Value>),
    /// Enclave code accepted by `Swork`.
    Code(Value),
    /// `Market.Files` entry of a cid.
    File(Option<Value>),
    FileBalance { balance: Value },
    Staking { data: Value },
    Storage(StorageValue),
    Raw(Value),
}

impl QueryResult {
    pub fn into_plain(self) -> ChainResult<PlainValue> {
        match self {
            QueryResult::Raw(value) => Ok(value),
            other => normalize(&other),
        }
    }
}

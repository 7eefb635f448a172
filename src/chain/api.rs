//! Ready node API.
//!
//! A `NodeApi` exists only once the connection is established and the runtime
//! metadata has been fetched. It is what handlers and the transaction monitor
//! actually talk to.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::chain::metadata::{Phase, RuntimeInfo, StorageEntry};
use crate::chain::query::{decode_shape, HeaderInfo, QueryResult, RawHeader, StorageValue, SystemHealth};
use crate::chain::registry::ErrorRegistry;
use crate::chain::rpc::{NodeClient, Subscription};
use crate::chain::scale::{from_hex, to_hex};
use crate::chain::storage::{self, storage_bytes};
use crate::chain::types::{ChainError, ChainResult, NodeConfig};
use crate::tx::types::{Extrinsic, ExtrinsicEvent};

pub const SUBMIT_AND_WATCH: &str = "author_submitAndWatchExtrinsic";
pub const UNWATCH: &str = "author_unwatchExtrinsic";

/// Bootstrapped access to the node.
pub struct NodeApi {
    client: Arc<dyn NodeClient>,
    registry: Arc<ErrorRegistry>,
    runtime: Option<Arc<RuntimeInfo>>,
    chain: String,
    spec_version: Option<u64>,
    query_prefixes: Vec<String>,
}

impl NodeApi {
    /// Wrap a client without contacting the node. Storage reads and event
    /// decoding need runtime metadata, see `with_runtime`.
    pub fn new(client: Arc<dyn NodeClient>, registry: ErrorRegistry, config: &NodeConfig) -> Self {
        Self {
            client,
            registry: Arc::new(registry),
            runtime: None,
            chain: "unknown".to_string(),
            spec_version: None,
            query_prefixes: config.query_method_prefixes.clone(),
        }
    }

    pub fn with_runtime(mut self, runtime: RuntimeInfo) -> Self {
        self.runtime = Some(Arc::new(runtime));
        self
    }

    /// Fetch chain name, runtime version and runtime metadata.
    ///
    /// The error registry comes from the metadata unless a registry file is
    /// configured and loads.
    pub async fn bootstrap(client: Arc<dyn NodeClient>, config: &NodeConfig) -> ChainResult<Self> {
        let (chain, version, metadata) = tokio::try_join!(
            client.request("system_chain", json!([])),
            client.request("state_getRuntimeVersion", json!([])),
            client.request("state_getMetadata", json!([])),
        )?;

        let metadata = metadata
            .as_str()
            .ok_or_else(|| ChainError::Metadata("state_getMetadata did not return hex".into()))?;
        let runtime = RuntimeInfo::from_hex(metadata)?;
        tracing::debug!(runtime = ?runtime, "Runtime metadata decoded");

        let registry = match &config.error_registry_path {
            Some(path) => registry_override(Path::new(path), runtime.error_registry()),
            None => runtime.error_registry().clone(),
        };
        tracing::info!(entries = registry.len(), "Error registry loaded");

        let mut api = Self::new(client, registry, config).with_runtime(runtime);
        api.chain = chain.as_str().unwrap_or("unknown").to_string();
        api.spec_version = version.get("specVersion").and_then(Value::as_u64);
        Ok(api)
    }

    pub fn client(&self) -> &Arc<dyn NodeClient> {
        &self.client
    }

    pub fn registry(&self) -> &ErrorRegistry {
        &self.registry
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn spec_version(&self) -> Option<u64> {
        self.spec_version
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    fn runtime(&self) -> ChainResult<&RuntimeInfo> {
        self.runtime
            .as_deref()
            .ok_or_else(|| ChainError::Metadata("runtime metadata not loaded".into()))
    }

    /// Number and hash of the best block.
    pub async fn header(&self) -> ChainResult<HeaderInfo> {
        let hash = self.client.request("chain_getBlockHash", json!([])).await?;
        let hash = hash
            .as_str()
            .ok_or_else(|| ChainError::Decode("best block hash is not a string".into()))?
            .to_string();

        let header: RawHeader = decode_shape(self.client.request("chain_getHeader", json!([hash])).await?)?;
        Ok(HeaderInfo {
            number: header.block_number()?,
            hash,
        })
    }

    /// Hash of the block at `number`.
    pub async fn block_hash(&self, number: u64) -> ChainResult<String> {
        match self.client.request("chain_getBlockHash", json!([number])).await? {
            Value::String(hash) => Ok(hash),
            _ => Err(ChainError::Decode(format!("no block at height {}", number))),
        }
    }

    pub async fn health(&self) -> ChainResult<SystemHealth> {
        decode_shape(self.client.request("system_health", json!([])).await?)
    }

    /// Generic read-only query. Only methods with an allowed prefix pass.
    ///
    /// Results of known shape come back typed; storage reads whose key
    /// belongs to a known item come back decoded.
    pub async fn query(&self, method: &str, params: Value) -> ChainResult<QueryResult> {
        if !self.query_prefixes.iter().any(|prefix| method.starts_with(prefix.as_str())) {
            return Err(ChainError::MethodNotAllowed(method.to_string()));
        }
        let key = params.get(0).and_then(Value::as_str).map(str::to_string);
        let result = self.client.request(method, params).await?;

        match method {
            "chain_getBlockHash" | "chain_getFinalizedHead" if result.is_string() => {
                Ok(QueryResult::BlockHash(decode_shape(result)?))
            }
            "system_health" => Ok(QueryResult::Health(decode_shape(result)?)),
            "state_getStorage" => match key.and_then(|key| self.known_entry(&key)) {
                Some(entry) => {
                    let value = self.runtime()?.decode_storage(entry, storage_bytes(&result)?.as_deref())?;
                    Ok(QueryResult::Storage(StorageValue {
                        pallet: entry.pallet.clone(),
                        entry: entry.name.clone(),
                        value: value.unwrap_or(Value::Null),
                    }))
                }
                None => Ok(QueryResult::Raw(result)),
            },
            _ => Ok(QueryResult::Raw(result)),
        }
    }

    fn known_entry(&self, key: &str) -> Option<&StorageEntry> {
        let key = from_hex(key).ok()?;
        self.runtime.as_deref()?.entry_for_key(&key)
    }

    /// Read and decode a storage item at the best block.
    ///
    /// `keys` are the SCALE-encoded map keys, empty for plain items.
    pub async fn storage(&self, pallet: &str, entry: &str, keys: &[Vec<u8>]) -> ChainResult<Option<Value>> {
        let runtime = self.runtime()?;
        let entry = runtime.storage_entry(pallet, entry)?;
        let key = to_hex(&entry.key(keys)?);

        let result = self.client.request("state_getStorage", json!([key])).await?;
        runtime.decode_storage(entry, storage_bytes(&result)?.as_deref())
    }

    /// Submit a signed extrinsic and watch its status.
    pub async fn submit_and_watch(&self, extrinsic: &Extrinsic) -> ChainResult<Subscription> {
        self.client
            .subscribe(SUBMIT_AND_WATCH, json!([extrinsic.to_hex()]), UNWATCH)
            .await
    }

    /// Events emitted by `extrinsic` in the block `block_hash`.
    ///
    /// Finds the extrinsic's position in the block body and keeps the
    /// `System.Events` records applied at that position.
    pub async fn extrinsic_events(
        &self,
        block_hash: &str,
        extrinsic: &Extrinsic,
    ) -> ChainResult<Vec<ExtrinsicEvent>> {
        let runtime = self.runtime()?;
        let events_key = to_hex(&storage::prefix_key("System", "Events"));

        let (block, events) = tokio::try_join!(
            self.client.request("chain_getBlock", json!([block_hash])),
            self.client.request("state_getStorage", json!([events_key, block_hash])),
        )?;

        let index = extrinsic_index(&block, extrinsic)?;
        let Some(bytes) = storage_bytes(&events)? else {
            return Ok(Vec::new());
        };

        Ok(runtime
            .decode_events(&bytes)?
            .into_iter()
            .filter(|record| record.phase == Phase::ApplyExtrinsic(index))
            .map(|record| record.event)
            .collect())
    }
}

impl std::fmt::Debug for NodeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeApi")
            .field("chain", &self.chain)
            .field("spec_version", &self.spec_version)
            .field("registry_entries", &self.registry.len())
            .field("runtime", &self.runtime)
            .finish()
    }
}

/// Position of `extrinsic` in a `chain_getBlock` response.
fn extrinsic_index(block: &Value, extrinsic: &Extrinsic) -> ChainResult<u32> {
    let extrinsics = block
        .pointer("/block/extrinsics")
        .and_then(Value::as_array)
        .ok_or_else(|| ChainError::Decode("block without extrinsics".into()))?;

    let wanted = extrinsic.to_hex();
    extrinsics
        .iter()
        .position(|candidate| {
            candidate
                .as_str()
                .map(|hex| hex.eq_ignore_ascii_case(&wanted))
                .unwrap_or(false)
        })
        .and_then(|index| u32::try_from(index).ok())
        .ok_or_else(|| ChainError::Decode(format!("extrinsic {} is not in the block", wanted)))
}

/// A registry file that cannot be loaded falls back to the metadata registry.
fn registry_override(path: &Path, from_metadata: &ErrorRegistry) -> ErrorRegistry {
    match ErrorRegistry::from_file(path) {
        Ok(registry) => {
            tracing::info!(path = %path.display(), "Using error registry override");
            registry
        }
        Err(e) => {
            tracing::warn!(error = %e, "Error registry override unavailable, using runtime metadata");
            from_metadata.clone()
        }
    }
}

//! Typed reads of the `Swork`, `Market` and `TransactionPayment` pallets.

use serde_json::Value;

use crate::chain::api::NodeApi;
use crate::chain::storage::bytes_arg;
use crate::chain::types::{ChainError, ChainResult};

impl NodeApi {
    /// `Swork.Identities` of an account.
    pub async fn swork_identity(&self, account: &[u8; 32]) -> ChainResult<Option<Value>> {
        self.storage("Swork", "Identities", &[account.to_vec()]).await
    }

    /// Work report of the anchor registered by `account`. `None` when the
    /// account has no identity or its anchor has not reported.
    pub async fn swork_work_report(&self, account: &[u8; 32]) -> ChainResult<Option<Value>> {
        let Some(identity) = self.swork_identity(account).await? else {
            return Ok(None);
        };
        let anchor = identity
            .get("anchor")
            .and_then(Value::as_str)
            .ok_or_else(|| ChainError::Decode(format!("identity without anchor: {}", identity)))?;

        self.storage("Swork", "WorkReports", &[bytes_arg(anchor)]).await
    }

    /// Enclave code accepted by `Swork`.
    pub async fn swork_code(&self) -> ChainResult<Value> {
        Ok(self.storage("Swork", "Code", &[]).await?.unwrap_or(Value::Null))
    }

    /// File order of `cid`. Runtimes that store `(FileInfo, UsedInfo)` pairs
    /// yield the file info only.
    pub async fn market_file(&self, cid: &str) -> ChainResult<Option<Value>> {
        let file = self.storage("Market", "Files", &[bytes_arg(cid)]).await?;
        Ok(file.map(|value| match value {
            Value::Array(mut pair) if pair.len() == 2 => pair.swap_remove(0),
            other => other,
        }))
    }

    pub async fn market_file_base_fee(&self) -> ChainResult<Value> {
        Ok(self
            .storage("Market", "FileBaseFee", &[])
            .await?
            .unwrap_or(Value::Null))
    }

    pub async fn next_fee_multiplier(&self) -> ChainResult<Value> {
        Ok(self
            .storage("TransactionPayment", "NextFeeMultiplier", &[])
            .await?
            .unwrap_or(Value::Null))
    }
}

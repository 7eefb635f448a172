//! Transaction submission and status monitoring.
//!
//! # State Machine
//! ```text
//! Pending ──submit──▶ Watching ──Invalid/Dropped/Usurped──▶ Rejected (Err)
//!                        │
//!                        └──InBlock + result event──▶ Resolved (Ok outcome)
//! ```
//! Every other status keeps the monitor in `Watching`. Resolution happens at
//! `InBlock`; finalization is not awaited.

use crate::chain::api::NodeApi;
use crate::chain::registry::ErrorRegistry;
use crate::chain::rpc::Subscription;
use crate::observability::metrics;
use crate::tx::decoder::failure_outcome;
use crate::tx::signer::Signer;
use crate::tx::types::{
    DispatchErrorRef, Extrinsic, ExtrinsicEvent, Transaction, TxError, TxOutcome, TxResult,
    TxStatus,
};

/// Submits signed transactions and follows them until they resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct TxSubmitter;

impl TxSubmitter {
    /// Sign, submit and watch `tx`.
    ///
    /// Failed dispatches come back as `Ok` with a failed outcome; rejections by
    /// the node are `Err(TxError::Rejected)`. Nothing is retried.
    pub async fn submit(api: &NodeApi, tx: &Transaction, signer: &dyn Signer) -> TxResult<TxOutcome> {
        let extrinsic = signer.sign(tx)?;

        let mut updates = api.submit_and_watch(&extrinsic).await?;
        tracing::debug!(
            kind = %tx.kind,
            nonce = tx.nonce,
            subscription = %updates.id(),
            "Transaction submitted"
        );

        let result = watch(api, tx, &extrinsic, &mut updates).await;
        // Dropping the subscription unwatches the extrinsic.
        drop(updates);

        match &result {
            Ok(outcome) if outcome.is_success() => {
                tracing::info!(kind = %tx.kind, nonce = tx.nonce, "Send transaction success");
                metrics::record_tx_outcome("success");
            }
            Ok(outcome) => {
                tracing::info!(
                    kind = %tx.kind,
                    nonce = tx.nonce,
                    message = outcome.message.as_deref().unwrap_or(""),
                    "Send transaction failed"
                );
                metrics::record_tx_outcome("failed");
            }
            Err(e) => {
                tracing::warn!(kind = %tx.kind, nonce = tx.nonce, error = %e, "Send transaction error");
                metrics::record_tx_outcome("error");
            }
        }
        result
    }
}

async fn watch(
    api: &NodeApi,
    tx: &Transaction,
    extrinsic: &Extrinsic,
    updates: &mut Subscription,
) -> TxResult<TxOutcome> {
    while let Some(update) = updates.next().await {
        let status = TxStatus::from_json(update)?;
        tracing::info!(status = %status.kind(), nonce = tx.nonce, "Transaction status");
        metrics::record_tx_status(status.kind());

        if status.is_rejection() {
            return Err(TxError::Rejected(status.kind()));
        }

        if let TxStatus::InBlock(block_hash) = &status {
            let events = api.extrinsic_events(block_hash, extrinsic).await?;
            match scan_events(&events, api.registry()) {
                Some(outcome) => return Ok(outcome),
                None => {
                    tracing::debug!(block = %block_hash, nonce = tx.nonce, "No result event yet");
                }
            }
        }
    }

    Err(TxError::StreamClosed)
}

/// Scan a block's events for the extrinsic result. The last match wins.
pub fn scan_events(events: &[ExtrinsicEvent], registry: &ErrorRegistry) -> Option<TxOutcome> {
    let mut outcome = None;
    for event in events {
        if event.is_failure() {
            outcome = Some(match DispatchErrorRef::from_event_data(&event.data) {
                Ok(reference) => failure_outcome(&reference, registry),
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable dispatch error");
                    TxOutcome::failed(None, None)
                }
            });
        } else if event.is_success() {
            outcome = Some(TxOutcome::success());
        }
    }
    outcome
}

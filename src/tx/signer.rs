//! Signing seam.
//!
//! Key management lives outside the gateway. Callers hand in extrinsics that
//! are already signed; `PresignedSigner` passes them through.

use thiserror::Error;

use crate::tx::types::{Extrinsic, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("Transaction payload is empty")]
    EmptyPayload,
}

/// Turns a transaction into a submittable extrinsic.
pub trait Signer: Send + Sync {
    fn sign(&self, tx: &Transaction) -> Result<Extrinsic, SignerError>;
}

/// Treats the transaction payload as an already signed extrinsic.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresignedSigner;

impl Signer for PresignedSigner {
    fn sign(&self, tx: &Transaction) -> Result<Extrinsic, SignerError> {
        if tx.payload.is_empty() {
            return Err(SignerError::EmptyPayload);
        }
        Ok(Extrinsic::new(tx.payload.clone()))
    }
}

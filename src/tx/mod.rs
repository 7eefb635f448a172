//! Transaction submission.
//!
//! Signing, submission with status monitoring, dispatch error decoding and
//! the per-category submission lock.

pub mod decoder;
pub mod guard;
pub mod monitor;
pub mod signer;
pub mod types;

pub use decoder::{decode, DecodeError, DecodedError};
pub use guard::TxLocker;
pub use monitor::TxSubmitter;
pub use signer::{PresignedSigner, Signer, SignerError};
pub use types::{
    DispatchErrorRef, Extrinsic, ExtrinsicEvent, OutcomeStatus, Transaction, TxError, TxOutcome,
    TxResult, TxStatus, TxStatusKind,
};

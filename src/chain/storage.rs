//! Storage keys and account addresses.
//!
//! A storage key is `twox128(pallet) ++ twox128(entry)` followed by one hashed
//! segment per map key, each hashed with the hasher the metadata declares.

use codec::Encode;
use serde_json::Value;
use sp_crypto_hashing::{blake2_128, blake2_256, blake2_512, twox_128, twox_256, twox_64};
use thiserror::Error;

use crate::chain::scale::from_hex;
use crate::chain::types::{ChainError, ChainResult};

pub use frame_metadata::v14::StorageHasher;

/// Length of the `pallet ++ entry` prefix.
pub const PREFIX_LEN: usize = 32;

const SS58_PREFIX: &[u8] = b"SS58PRE";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is not valid base58: {0}")]
    Base58(String),

    #[error("address has an unsupported length of {0} bytes")]
    Length(usize),

    #[error("address checksum mismatch")]
    Checksum,

    #[error("account id must be 32 bytes of hex")]
    Hex,
}

/// `twox128(pallet) ++ twox128(entry)`.
pub fn prefix_key(pallet: &str, entry: &str) -> [u8; PREFIX_LEN] {
    let mut key = [0u8; PREFIX_LEN];
    key[..16].copy_from_slice(&twox_128(pallet.as_bytes()));
    key[16..].copy_from_slice(&twox_128(entry.as_bytes()));
    key
}

/// Hash one encoded map key.
pub fn hash_key(hasher: &StorageHasher, encoded: &[u8]) -> Vec<u8> {
    match hasher {
        StorageHasher::Blake2_128 => blake2_128(encoded).to_vec(),
        StorageHasher::Blake2_256 => blake2_256(encoded).to_vec(),
        StorageHasher::Blake2_128Concat => [&blake2_128(encoded)[..], encoded].concat(),
        StorageHasher::Twox128 => twox_128(encoded).to_vec(),
        StorageHasher::Twox256 => twox_256(encoded).to_vec(),
        StorageHasher::Twox64Concat => [&twox_64(encoded)[..], encoded].concat(),
        StorageHasher::Identity => encoded.to_vec(),
    }
}

/// Full key for an entry, given its hashers and SCALE-encoded map keys.
pub fn storage_key(
    pallet: &str,
    entry: &str,
    hashers: &[StorageHasher],
    keys: &[Vec<u8>],
) -> ChainResult<Vec<u8>> {
    if hashers.len() != keys.len() {
        return Err(ChainError::Metadata(format!(
            "{}.{} takes {} keys, got {}",
            pallet,
            entry,
            hashers.len(),
            keys.len()
        )));
    }

    let mut key = prefix_key(pallet, entry).to_vec();
    for (hasher, encoded) in hashers.iter().zip(keys) {
        key.extend(hash_key(hasher, encoded));
    }
    Ok(key)
}

/// A byte-string argument: `0x` hex when it parses as such, UTF-8 otherwise.
/// Returned SCALE-encoded as `Vec<u8>`.
pub fn bytes_arg(arg: &str) -> Vec<u8> {
    let raw = match arg.strip_prefix("0x").map(hex::decode) {
        Some(Ok(bytes)) => bytes,
        _ => arg.as_bytes().to_vec(),
    };
    raw.encode()
}

/// Parse an SS58 address or a `0x` hex account id into its 32-byte public key.
pub fn account_id(address: &str) -> Result<[u8; 32], AddressError> {
    if let Some(digits) = address.strip_prefix("0x") {
        let bytes = hex::decode(digits).map_err(|_| AddressError::Hex)?;
        return bytes.try_into().map_err(|_| AddressError::Hex);
    }

    let data = bs58::decode(address)
        .into_vec()
        .map_err(|e| AddressError::Base58(e.to_string()))?;
    let prefix_len = match data.first() {
        Some(0..=63) => 1,
        Some(64..=127) => 2,
        _ => return Err(AddressError::Length(data.len())),
    };
    if data.len() != prefix_len + 32 + 2 {
        return Err(AddressError::Length(data.len()));
    }

    let (body, checksum) = data.split_at(prefix_len + 32);
    let hash = blake2_512(&[SS58_PREFIX, body].concat());
    if checksum != &hash[..2] {
        return Err(AddressError::Checksum);
    }

    let mut account = [0u8; 32];
    account.copy_from_slice(&body[prefix_len..]);
    Ok(account)
}

/// Bytes of a `state_getStorage` result. `null` means the key is absent.
pub fn storage_bytes(result: &Value) -> ChainResult<Option<Vec<u8>>> {
    match result {
        Value::Null => Ok(None),
        Value::String(encoded) => from_hex(encoded).map(Some),
        other => Err(ChainError::Decode(format!("storage value is not hex: {}", other))),
    }
}

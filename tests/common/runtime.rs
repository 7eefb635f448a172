//! A small Crust-like runtime: metadata, storage keys and encoded events.

use codec::Encode;
use frame_metadata::v14::{
    ExtrinsicMetadata, PalletErrorMetadata, PalletEventMetadata, PalletMetadata,
    PalletStorageMetadata, RuntimeMetadataV14, StorageEntryMetadata, StorageEntryModifier,
    StorageEntryType,
};
use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed, META_RESERVED};
use scale_info::{meta_type, TypeInfo};
use serde_json::{json, Value};

use chain_gateway::chain::storage::{bytes_arg, prefix_key, storage_key, StorageHasher};

pub const MARKET_INDEX: u8 = 3;

/// Extrinsics of every block the mock node serves, in order.
pub const BLOCK_EXTRINSICS: [&str; 3] = ["0x280401000b", "0x2d028400", "0x01"];
/// Position of the `balances.transfer` extrinsic (`0x2d028400`).
pub const TRANSFER_INDEX: u32 = 1;
/// Position of the `market.placeStorageOrder` extrinsic (`0x01`).
pub const ORDER_INDEX: u32 = 2;

#[derive(Encode, TypeInfo)]
pub enum Phase {
    ApplyExtrinsic(u32),
    Finalization,
    Initialization,
}

#[derive(Encode, TypeInfo, Default)]
pub struct DispatchInfo {
    pub weight: u64,
    pub class: u8,
    pub pays_fee: bool,
}

#[derive(Encode, TypeInfo)]
pub struct ModuleError {
    pub index: u8,
    pub error: [u8; 4],
}

#[derive(Encode, TypeInfo)]
pub enum TokenError {
    NoFunds,
    WouldDie,
}

#[derive(Encode, TypeInfo)]
pub enum DispatchError {
    Other,
    CannotLookup,
    BadOrigin,
    Module(ModuleError),
    Token(TokenError),
}

#[derive(Encode, TypeInfo)]
pub enum SystemEvent {
    ExtrinsicSuccess {
        dispatch_info: DispatchInfo,
    },
    ExtrinsicFailed {
        dispatch_error: DispatchError,
        dispatch_info: DispatchInfo,
    },
}

#[derive(Encode, TypeInfo)]
pub enum BalancesEvent {
    Transfer {
        from: [u8; 32],
        to: [u8; 32],
        #[codec(compact)]
        amount: u128,
    },
}

#[derive(Encode, TypeInfo)]
pub enum RuntimeEvent {
    #[codec(index = 0)]
    System(SystemEvent),
    #[codec(index = 4)]
    Balances(BalancesEvent),
}

#[derive(Encode, TypeInfo)]
pub struct EventRecord {
    pub phase: Phase,
    pub event: RuntimeEvent,
    pub topics: Vec<[u8; 32]>,
}

#[derive(TypeInfo)]
pub enum MarketError {
    /// Not enough currency to place the order.
    InsufficientCurrency,
    /// The file size
    ///
    /// exceeds the limit.
    FileTooLarge,
    /// File does not exist.
    FileNotExist,
}

#[derive(Encode, TypeInfo)]
pub struct Identity {
    pub anchor: Vec<u8>,
    pub punishment_deadline: u64,
    pub group: Option<[u8; 32]>,
}

#[derive(Encode, TypeInfo)]
pub struct WorkReport {
    pub report_slot: u64,
    pub spower: u64,
    pub free: u64,
    pub reported_files_size: u64,
    pub reported_srd_root: Vec<u8>,
    pub reported_files_root: Vec<u8>,
}

#[derive(Encode, TypeInfo)]
pub struct FileInfo {
    pub file_size: u64,
    pub spower: u64,
    pub expired_at: u32,
    pub calculated_at: u32,
    pub amount: u128,
    pub prepaid: u128,
    pub reported_replica_count: u32,
}

#[derive(Encode, TypeInfo)]
pub struct UsedInfo {
    pub used_size: u64,
    pub reported_group_count: u32,
}

fn plain<T: TypeInfo + 'static>(name: &'static str, default: Vec<u8>) -> StorageEntryMetadata {
    StorageEntryMetadata {
        name,
        modifier: StorageEntryModifier::Default,
        ty: StorageEntryType::Plain(meta_type::<T>()),
        default,
        docs: vec![],
    }
}

fn map<K: TypeInfo + 'static, V: TypeInfo + 'static>(
    name: &'static str,
    hasher: StorageHasher,
) -> StorageEntryMetadata {
    StorageEntryMetadata {
        name,
        modifier: StorageEntryModifier::Optional,
        ty: StorageEntryType::Map {
            hashers: vec![hasher],
            key: meta_type::<K>(),
            value: meta_type::<V>(),
        },
        default: vec![0],
        docs: vec![],
    }
}

fn pallet(name: &'static str, index: u8, entries: Vec<StorageEntryMetadata>) -> PalletMetadata {
    PalletMetadata {
        name,
        storage: Some(PalletStorageMetadata { prefix: name, entries }),
        calls: None,
        event: None,
        constants: vec![],
        error: None,
        index,
    }
}

/// SCALE-encoded V14 metadata, as `state_getMetadata` returns it.
pub fn metadata_hex() -> String {
    let mut system = pallet("System", 0, vec![plain::<Vec<EventRecord>>("Events", vec![0])]);
    system.event = Some(PalletEventMetadata {
        ty: meta_type::<SystemEvent>(),
    });

    let mut balances = pallet("Balances", 4, vec![]);
    balances.event = Some(PalletEventMetadata {
        ty: meta_type::<BalancesEvent>(),
    });

    let mut market = pallet(
        "Market",
        MARKET_INDEX,
        vec![
            map::<Vec<u8>, (FileInfo, UsedInfo)>("Files", StorageHasher::Twox64Concat),
            plain::<u128>("FileBaseFee", 0u128.encode()),
        ],
    );
    market.error = Some(PalletErrorMetadata {
        ty: meta_type::<MarketError>(),
    });

    let swork = pallet(
        "Swork",
        5,
        vec![
            map::<[u8; 32], Identity>("Identities", StorageHasher::Blake2_128Concat),
            map::<Vec<u8>, WorkReport>("WorkReports", StorageHasher::Twox64Concat),
            plain::<Vec<u8>>("Code", vec![0]),
        ],
    );

    let payment = pallet(
        "TransactionPayment",
        6,
        vec![plain::<u128>("NextFeeMultiplier", 1_000_000_000_000_000_000u128.encode())],
    );

    let extrinsic = ExtrinsicMetadata {
        ty: meta_type::<()>(),
        version: 4,
        signed_extensions: vec![],
    };
    let metadata = RuntimeMetadataV14::new(
        vec![system, balances, market, swork, payment],
        extrinsic,
        meta_type::<()>(),
    );
    hex(&RuntimeMetadataPrefixed(META_RESERVED, RuntimeMetadata::V14(metadata)).encode())
}

pub fn hex(bytes: &[u8]) -> String {
    format!("0x{}", ::hex::encode(bytes))
}

pub fn events_key() -> String {
    hex(&prefix_key("System", "Events"))
}

pub fn plain_key(pallet: &str, entry: &str) -> String {
    hex(&prefix_key(pallet, entry))
}

pub fn identity_key(account: &[u8; 32]) -> String {
    let key = storage_key(
        "Swork",
        "Identities",
        &[StorageHasher::Blake2_128Concat],
        &[account.to_vec()],
    );
    hex(&key.unwrap())
}

pub fn work_report_key(anchor: &[u8]) -> String {
    let key = storage_key(
        "Swork",
        "WorkReports",
        &[StorageHasher::Twox64Concat],
        &[anchor.to_vec().encode()],
    );
    hex(&key.unwrap())
}

pub fn file_key(cid: &str) -> String {
    let key = storage_key("Market", "Files", &[StorageHasher::Twox64Concat], &[bytes_arg(cid)]);
    hex(&key.unwrap())
}

pub fn events_hex(records: &[EventRecord]) -> String {
    hex(&records.encode())
}

pub fn success_at(index: u32) -> EventRecord {
    EventRecord {
        phase: Phase::ApplyExtrinsic(index),
        event: RuntimeEvent::System(SystemEvent::ExtrinsicSuccess {
            dispatch_info: DispatchInfo::default(),
        }),
        topics: vec![],
    }
}

pub fn failed_at(index: u32, dispatch_error: DispatchError) -> EventRecord {
    EventRecord {
        phase: Phase::ApplyExtrinsic(index),
        event: RuntimeEvent::System(SystemEvent::ExtrinsicFailed {
            dispatch_error,
            dispatch_info: DispatchInfo::default(),
        }),
        topics: vec![],
    }
}

pub fn transfer_at(index: u32, amount: u128) -> EventRecord {
    EventRecord {
        phase: Phase::ApplyExtrinsic(index),
        event: RuntimeEvent::Balances(BalancesEvent::Transfer {
            from: [1; 32],
            to: [2; 32],
            amount,
        }),
        topics: vec![],
    }
}

/// `DispatchError::Module` with a four-byte error field.
pub fn module_error(index: u8, error: u8) -> DispatchError {
    DispatchError::Module(ModuleError {
        index,
        error: [error, 0, 0, 0],
    })
}

/// `chain_getBlock` response carrying `BLOCK_EXTRINSICS`.
pub fn block() -> Value {
    json!({
        "block": {
            "header": { "parentHash": "0x00", "number": "0x2a" },
            "extrinsics": BLOCK_EXTRINSICS,
        },
        "justifications": null
    })
}

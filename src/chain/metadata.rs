//! Runtime metadata.
//!
//! Fetched once per connection with `state_getMetadata`. It carries the type
//! registry every storage value and event is decoded against, the storage
//! layout used to build keys, and the error tables behind `ErrorRegistry`.

use std::collections::HashMap;

use codec::{Compact, Decode};
use frame_metadata::v14::{RuntimeMetadataV14, StorageEntryModifier, StorageEntryType};
use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed, META_RESERVED};
use scale_info::{form::PortableForm, PortableRegistry, TypeDef, Variant};
use serde_json::Value;

use crate::chain::registry::{ErrorMetadata, ErrorRegistry};
use crate::chain::scale::{self, decode_all, decode_field_values, decode_value, lower_first, ScaleError};
use crate::chain::storage::{self, StorageHasher, PREFIX_LEN};
use crate::chain::types::{ChainError, ChainResult};
use crate::tx::types::ExtrinsicEvent;

/// Layout of one storage item.
#[derive(Debug, Clone)]
pub struct StorageEntry {
    pub pallet: String,
    pub name: String,
    prefix: String,
    hashers: Vec<StorageHasher>,
    value_ty: u32,
    optional: bool,
    default: Vec<u8>,
}

impl StorageEntry {
    /// Key for this item given its SCALE-encoded map keys.
    pub fn key(&self, keys: &[Vec<u8>]) -> ChainResult<Vec<u8>> {
        storage::storage_key(&self.prefix, &self.name, &self.hashers, keys)
    }

    pub fn is_map(&self) -> bool {
        !self.hashers.is_empty()
    }
}

/// When in the block an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ApplyExtrinsic(u32),
    Finalization,
    Initialization,
}

impl Phase {
    fn from_value(value: &Value) -> ChainResult<Self> {
        match value {
            Value::String(name) if name == "Finalization" => Ok(Phase::Finalization),
            Value::String(name) if name == "Initialization" => Ok(Phase::Initialization),
            Value::Object(map) => map
                .get("applyExtrinsic")
                .and_then(Value::as_u64)
                .and_then(|index| u32::try_from(index).ok())
                .map(Phase::ApplyExtrinsic)
                .ok_or_else(|| ChainError::Decode(format!("event phase: {}", value))),
            other => Err(ChainError::Decode(format!("event phase: {}", other))),
        }
    }
}

/// One entry of `System.Events`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub phase: Phase,
    pub event: ExtrinsicEvent,
}

/// Decoded runtime metadata.
pub struct RuntimeInfo {
    types: PortableRegistry,
    entries: HashMap<(String, String), StorageEntry>,
    prefixes: HashMap<[u8; PREFIX_LEN], (String, String)>,
    errors: ErrorRegistry,
}

impl RuntimeInfo {
    /// Parse the hex string returned by `state_getMetadata`.
    pub fn from_hex(encoded: &str) -> ChainResult<Self> {
        Self::from_bytes(&scale::from_hex(encoded)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> ChainResult<Self> {
        let prefixed = RuntimeMetadataPrefixed::decode(&mut &bytes[..])
            .map_err(|e| ChainError::Metadata(e.to_string()))?;
        if prefixed.0 != META_RESERVED {
            return Err(ChainError::Metadata(format!("bad magic number {:#x}", prefixed.0)));
        }
        match prefixed.1 {
            RuntimeMetadata::V14(metadata) => Self::from_v14(metadata),
            _ => Err(ChainError::Metadata("only V14 metadata is supported".into())),
        }
    }

    pub fn from_v14(metadata: RuntimeMetadataV14) -> ChainResult<Self> {
        let mut info = Self {
            types: metadata.types,
            entries: HashMap::new(),
            prefixes: HashMap::new(),
            errors: ErrorRegistry::empty(),
        };

        for pallet in &metadata.pallets {
            if let Some(pallet_storage) = &pallet.storage {
                for entry in &pallet_storage.entries {
                    let (hashers, value_ty) = match &entry.ty {
                        StorageEntryType::Plain(ty) => (Vec::new(), ty.id),
                        StorageEntryType::Map { hashers, value, .. } => (hashers.clone(), value.id),
                    };
                    let item = StorageEntry {
                        pallet: pallet.name.clone(),
                        name: entry.name.clone(),
                        prefix: pallet_storage.prefix.clone(),
                        hashers,
                        value_ty,
                        optional: matches!(entry.modifier, StorageEntryModifier::Optional),
                        default: entry.default.clone(),
                    };
                    let names = (pallet.name.clone(), entry.name.clone());
                    info.prefixes
                        .insert(storage::prefix_key(&item.prefix, &item.name), names.clone());
                    info.entries.insert(names, item);
                }
            }

            if let Some(error) = &pallet.error {
                let section = lower_first(&pallet.name);
                let declared: Vec<_> = info
                    .variants(error.ty.id)?
                    .iter()
                    .map(|variant| {
                        let metadata = ErrorMetadata {
                            section: section.clone(),
                            name: variant.name.clone(),
                            documentation: doc_lines(&variant.docs),
                        };
                        (variant.index, metadata)
                    })
                    .collect();
                for (index, metadata) in declared {
                    info.errors.insert(pallet.index, index, metadata);
                }
            }
        }
        Ok(info)
    }

    pub fn error_registry(&self) -> &ErrorRegistry {
        &self.errors
    }

    pub fn storage_entry(&self, pallet: &str, name: &str) -> ChainResult<&StorageEntry> {
        self.entries
            .get(&(pallet.to_string(), name.to_string()))
            .ok_or_else(|| ChainError::Metadata(format!("no storage item {}.{}", pallet, name)))
    }

    /// The item a full storage key belongs to.
    pub fn entry_for_key(&self, key: &[u8]) -> Option<&StorageEntry> {
        let prefix: [u8; PREFIX_LEN] = key.get(..PREFIX_LEN)?.try_into().ok()?;
        self.prefixes
            .get(&prefix)
            .and_then(|names| self.entries.get(names))
    }

    /// Decode a storage value. An absent value decodes to the item's default,
    /// or `None` for optional items.
    pub fn decode_storage(&self, entry: &StorageEntry, bytes: Option<&[u8]>) -> ChainResult<Option<Value>> {
        let bytes = match bytes {
            Some(bytes) => bytes,
            None if entry.optional => return Ok(None),
            None => &entry.default,
        };
        Ok(Some(decode_all(&self.types, entry.value_ty, bytes)?))
    }

    /// Decode the raw `System.Events` value.
    pub fn decode_events(&self, bytes: &[u8]) -> ChainResult<Vec<EventRecord>> {
        let entry = self.storage_entry("System", "Events")?;
        let record_ty = match &self.resolve(entry.value_ty)?.type_def {
            TypeDef::Sequence(sequence) => sequence.type_param.id,
            _ => return Err(ChainError::Metadata("System.Events is not a sequence".into())),
        };
        let fields = match &self.resolve(record_ty)?.type_def {
            TypeDef::Composite(composite) => &composite.fields,
            _ => return Err(ChainError::Metadata("event record is not a struct".into())),
        };

        let mut input = bytes;
        let count = Compact::<u32>::decode(&mut input).map_err(ScaleError::from)?.0;
        let mut records = Vec::with_capacity((count as usize).min(input.len()));
        for _ in 0..count {
            let mut phase = None;
            let mut event = None;
            for field in fields {
                match field.name.as_deref() {
                    Some("phase") => {
                        let value = decode_value(&self.types, field.ty.id, &mut input)?;
                        phase = Some(Phase::from_value(&value)?);
                    }
                    Some("event") => event = Some(self.decode_event(field.ty.id, &mut input)?),
                    _ => {
                        decode_value(&self.types, field.ty.id, &mut input)?;
                    }
                }
            }
            match (phase, event) {
                (Some(phase), Some(event)) => records.push(EventRecord { phase, event }),
                _ => return Err(ChainError::Metadata("event record lacks phase or event".into())),
            }
        }
        Ok(records)
    }

    /// Outer runtime event: pallet variant wrapping the pallet's own event enum.
    fn decode_event(&self, outer_ty: u32, input: &mut &[u8]) -> ChainResult<ExtrinsicEvent> {
        let pallet = self.variant(outer_ty, input)?;
        let inner_ty = match pallet.fields.as_slice() {
            [field] => field.ty.id,
            _ => {
                return Err(ChainError::Metadata(format!(
                    "event variant {} does not wrap a pallet event",
                    pallet.name
                )))
            }
        };
        let event = self.variant(inner_ty, input)?;
        let data = decode_field_values(&self.types, &event.fields, input)?;

        Ok(ExtrinsicEvent {
            section: lower_first(&pallet.name),
            method: event.name.clone(),
            data: Value::Array(data),
        })
    }

    fn variant(&self, type_id: u32, input: &mut &[u8]) -> ChainResult<&Variant<PortableForm>> {
        let index = u8::decode(input).map_err(ScaleError::from)?;
        self.variants(type_id)?
            .iter()
            .find(|variant| variant.index == index)
            .ok_or_else(|| ScaleError::UnknownVariant { type_id, index }.into())
    }

    fn variants(&self, type_id: u32) -> ChainResult<&[Variant<PortableForm>]> {
        match &self.resolve(type_id)?.type_def {
            TypeDef::Variant(def) => Ok(&def.variants),
            _ => Err(ChainError::Metadata(format!("type {} is not an enum", type_id))),
        }
    }

    fn resolve(&self, type_id: u32) -> ChainResult<&scale_info::Type<PortableForm>> {
        self.types
            .resolve(type_id)
            .ok_or_else(|| ScaleError::UnknownType(type_id).into())
    }
}

impl std::fmt::Debug for RuntimeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeInfo")
            .field("types", &self.types.types.len())
            .field("storage_items", &self.entries.len())
            .field("errors", &self.errors.len())
            .finish()
    }
}

fn doc_lines(docs: &[String]) -> Vec<String> {
    docs.iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

//! Type-driven SCALE decoding into plain JSON.
//!
//! Values are decoded against the runtime's portable type registry and
//! rendered the way block explorers show them: byte sequences as `0x` hex,
//! struct fields in camelCase, `Option` as `null` or the inner value, unit
//! enum variants as their name and other variants as `{variant: value}`.

use codec::{Compact, Decode};
use scale_info::{form::PortableForm, Field, PortableRegistry, TypeDef, TypeDefPrimitive};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::chain::types::ChainError;

/// Nesting limit for recursive types.
const MAX_DEPTH: usize = 128;

#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("type {0} is not in the registry")]
    UnknownType(u32),

    #[error("type {type_id} has no variant with index {index}")]
    UnknownVariant { type_id: u32, index: u8 },

    #[error("bit sequence store type {0} is not an unsigned integer")]
    BitStore(u32),

    #[error("input ended early")]
    Eof,

    #[error("{0} bytes left over after the value")]
    TrailingBytes(usize),

    #[error("value nested deeper than 128 levels")]
    TooDeep,

    #[error(transparent)]
    Codec(#[from] codec::Error),
}

impl From<ScaleError> for ChainError {
    fn from(err: ScaleError) -> Self {
        ChainError::Decode(format!("SCALE: {}", err))
    }
}

/// Decode one value of `type_id` from the front of `input`.
pub fn decode_value(
    types: &PortableRegistry,
    type_id: u32,
    input: &mut &[u8],
) -> Result<Value, ScaleError> {
    Decoder { types, depth: 0 }.value(type_id, input)
}

/// Decode `bytes` as exactly one value of `type_id`.
pub fn decode_all(types: &PortableRegistry, type_id: u32, bytes: &[u8]) -> Result<Value, ScaleError> {
    let mut input = bytes;
    let value = decode_value(types, type_id, &mut input)?;
    if !input.is_empty() {
        return Err(ScaleError::TrailingBytes(input.len()));
    }
    Ok(value)
}

/// Decode each field in declaration order, ignoring field names.
pub fn decode_field_values(
    types: &PortableRegistry,
    fields: &[Field<PortableForm>],
    input: &mut &[u8],
) -> Result<Vec<Value>, ScaleError> {
    let mut decoder = Decoder { types, depth: 0 };
    fields
        .iter()
        .map(|field| decoder.value(field.ty.id, input))
        .collect()
}

struct Decoder<'a> {
    types: &'a PortableRegistry,
    depth: usize,
}

impl Decoder<'_> {
    fn value(&mut self, type_id: u32, input: &mut &[u8]) -> Result<Value, ScaleError> {
        if self.depth >= MAX_DEPTH {
            return Err(ScaleError::TooDeep);
        }
        self.depth += 1;
        let value = self.value_of(type_id, input);
        self.depth -= 1;
        value
    }

    fn value_of(&mut self, type_id: u32, input: &mut &[u8]) -> Result<Value, ScaleError> {
        let types = self.types;
        let ty = types.resolve(type_id).ok_or(ScaleError::UnknownType(type_id))?;

        match &ty.type_def {
            TypeDef::Composite(composite) => self.fields(&composite.fields, input),
            TypeDef::Variant(def) => {
                let index = u8::decode(input)?;
                let variant = def
                    .variants
                    .iter()
                    .find(|variant| variant.index == index)
                    .ok_or(ScaleError::UnknownVariant { type_id, index })?;

                if matches!(ty.path.segments.as_slice(), [name] if name == "Option") {
                    return self.fields(&variant.fields, input);
                }
                if variant.fields.is_empty() {
                    return Ok(Value::String(variant.name.clone()));
                }
                let inner = self.fields(&variant.fields, input)?;
                let mut map = Map::new();
                map.insert(lower_first(&variant.name), inner);
                Ok(Value::Object(map))
            }
            TypeDef::Sequence(sequence) => {
                let len = Compact::<u32>::decode(input)?.0 as usize;
                self.items(sequence.type_param.id, len, input)
            }
            TypeDef::Array(array) => self.items(array.type_param.id, array.len as usize, input),
            TypeDef::Tuple(tuple) => {
                if tuple.fields.is_empty() {
                    return Ok(Value::Null);
                }
                tuple
                    .fields
                    .iter()
                    .map(|field| self.value(field.id, input))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            TypeDef::Primitive(primitive) => primitive_value(primitive, input),
            TypeDef::Compact(_) => Ok(u128_value(Compact::<u128>::decode(input)?.0)),
            TypeDef::BitSequence(bits) => self.bits(bits.bit_store_type.id, input),
        }
    }

    fn fields(&mut self, fields: &[Field<PortableForm>], input: &mut &[u8]) -> Result<Value, ScaleError> {
        match fields {
            [] => Ok(Value::Null),
            [single] if single.name.is_none() => self.value(single.ty.id, input),
            _ if fields.iter().all(|field| field.name.is_some()) => {
                let mut map = Map::new();
                for field in fields {
                    let value = self.value(field.ty.id, input)?;
                    let name = field.name.as_deref().unwrap_or_default();
                    map.insert(camel_case(name), value);
                }
                Ok(Value::Object(map))
            }
            _ => fields
                .iter()
                .map(|field| self.value(field.ty.id, input))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }

    fn items(&mut self, item_type: u32, len: usize, input: &mut &[u8]) -> Result<Value, ScaleError> {
        let item = self
            .types
            .resolve(item_type)
            .ok_or(ScaleError::UnknownType(item_type))?;
        if matches!(item.type_def, TypeDef::Primitive(TypeDefPrimitive::U8)) {
            return take(input, len).map(|bytes| Value::String(to_hex(bytes)));
        }

        let mut values = Vec::with_capacity(len.min(input.len()));
        for _ in 0..len {
            values.push(self.value(item_type, input)?);
        }
        Ok(Value::Array(values))
    }

    fn bits(&mut self, store_type: u32, input: &mut &[u8]) -> Result<Value, ScaleError> {
        let store = self
            .types
            .resolve(store_type)
            .ok_or(ScaleError::UnknownType(store_type))?;
        let store_bytes = match &store.type_def {
            TypeDef::Primitive(TypeDefPrimitive::U8) => 1,
            TypeDef::Primitive(TypeDefPrimitive::U16) => 2,
            TypeDef::Primitive(TypeDefPrimitive::U32) => 4,
            TypeDef::Primitive(TypeDefPrimitive::U64) => 8,
            _ => return Err(ScaleError::BitStore(store_type)),
        };
        let bits = Compact::<u32>::decode(input)?.0 as usize;
        let units = bits.div_ceil(store_bytes * 8);
        take(input, units * store_bytes).map(|bytes| Value::String(to_hex(bytes)))
    }
}

fn primitive_value(primitive: &TypeDefPrimitive, input: &mut &[u8]) -> Result<Value, ScaleError> {
    Ok(match primitive {
        TypeDefPrimitive::Bool => Value::Bool(bool::decode(input)?),
        TypeDefPrimitive::Char => {
            let code = u32::decode(input)?;
            Value::String(char::from_u32(code).map(String::from).unwrap_or_default())
        }
        TypeDefPrimitive::Str => Value::String(String::decode(input)?),
        TypeDefPrimitive::U8 => Value::from(u8::decode(input)?),
        TypeDefPrimitive::U16 => Value::from(u16::decode(input)?),
        TypeDefPrimitive::U32 => Value::from(u32::decode(input)?),
        TypeDefPrimitive::U64 => Value::from(u64::decode(input)?),
        TypeDefPrimitive::U128 => u128_value(u128::decode(input)?),
        TypeDefPrimitive::I8 => Value::from(i8::decode(input)?),
        TypeDefPrimitive::I16 => Value::from(i16::decode(input)?),
        TypeDefPrimitive::I32 => Value::from(i32::decode(input)?),
        TypeDefPrimitive::I64 => Value::from(i64::decode(input)?),
        TypeDefPrimitive::I128 => {
            let n = i128::decode(input)?;
            i64::try_from(n)
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(n.to_string()))
        }
        TypeDefPrimitive::U256 | TypeDefPrimitive::I256 => Value::String(to_hex(take(input, 32)?)),
    })
}

/// Numbers beyond `u64` are rendered as decimal strings.
fn u128_value(n: u128) -> Value {
    u64::try_from(n)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(n.to_string()))
}

fn take<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8], ScaleError> {
    if input.len() < len {
        return Err(ScaleError::Eof);
    }
    let (head, rest) = input.split_at(len);
    *input = rest;
    Ok(head)
}

pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse `0x`-prefixed (or bare) hex.
pub fn from_hex(encoded: &str) -> Result<Vec<u8>, ChainError> {
    let digits = encoded.strip_prefix("0x").unwrap_or(encoded);
    hex::decode(digits).map_err(|e| ChainError::Decode(format!("hex '{}': {}", encoded, e)))
}

/// `ExtrinsicFailed` -> `extrinsicFailed`.
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `punishment_deadline` -> `punishmentDeadline`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

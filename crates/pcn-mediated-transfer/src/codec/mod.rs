//! # Record Codec
//!
//! Every state entity is a [`Record`]: a stable type tag plus a `validate`
//! hook. Encoding produces a JSON mapping carrying the tag under `_type`
//! (and, at the top level, the schema version under `_version`). Decoding
//! consumes and drops both, rebuilds the entity and re-runs `validate`, so a
//! decoded record is held to the same rules as a freshly constructed one.
//!
//! Nested entity fields go through the [`tagged`] serde helpers so each
//! nested record carries and checks its own tag.

mod registry;
pub mod tagged;

pub use registry::{decode_any, registered_tags, AnyRecord};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use shared_types::ValidationError;
use thiserror::Error;

/// Field carrying the type tag.
pub const TYPE_FIELD: &str = "_type";

/// Field carrying the schema version.
pub const VERSION_FIELD: &str = "_version";

/// Schema version written by [`encode`].
pub const RECORD_VERSION: u64 = 1;

/// A state entity representable as a tagged record.
pub trait Record: Serialize + DeserializeOwned {
    /// Stable type discriminator.
    const TYPE_TAG: &'static str;

    /// Check every invariant of the entity.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Codec errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The mapping has no `_type`.
    #[error("Missing _type for {0}")]
    MissingTag(&'static str),

    /// No record type is registered under the tag.
    #[error("Unknown record type: {0}")]
    UnknownTag(String),

    /// The tag names another record type.
    #[error("Expected record type {expected}, found {found}")]
    TagMismatch {
        /// Tag of the requested type
        expected: &'static str,
        /// Tag found in the mapping
        found: String,
    },

    /// The schema version is not supported.
    #[error("Unsupported record version: {0}")]
    UnsupportedVersion(u64),

    /// The mapping does not have the record's shape.
    #[error("Malformed record: {0}")]
    Malformed(String),

    /// The rebuilt record violates an invariant.
    #[error("Invalid record: {0}")]
    Invalid(#[from] ValidationError),
}

fn into_object(value: Value) -> Result<Map<String, Value>, CodecError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CodecError::Malformed(format!(
            "expected a mapping, found {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

/// Read the `_type` of a mapping without consuming it.
pub fn peek_tag(value: &Value) -> Option<&str> {
    value.get(TYPE_FIELD).and_then(Value::as_str)
}

/// Serialize `record` to a mapping carrying its `_type`.
pub(crate) fn to_tagged_value<T: Record>(record: &T) -> Result<Value, CodecError> {
    let value = serde_json::to_value(record).map_err(|e| CodecError::Malformed(e.to_string()))?;
    let mut map = into_object(value)?;
    map.insert(TYPE_FIELD.to_string(), Value::String(T::TYPE_TAG.to_string()));
    Ok(Value::Object(map))
}

/// Rebuild a record from a mapping carrying its `_type`, then validate it.
pub(crate) fn from_tagged_value<T: Record>(value: Value) -> Result<T, CodecError> {
    let mut map = into_object(value)?;
    let tag = map
        .remove(TYPE_FIELD)
        .ok_or(CodecError::MissingTag(T::TYPE_TAG))?;
    let tag = tag
        .as_str()
        .ok_or_else(|| CodecError::Malformed(format!("{} is not a string", TYPE_FIELD)))?;
    if tag != T::TYPE_TAG {
        return Err(CodecError::TagMismatch {
            expected: T::TYPE_TAG,
            found: tag.to_string(),
        });
    }

    let record: T = serde_json::from_value(Value::Object(map))
        .map_err(|e| CodecError::Malformed(e.to_string()))?;
    record.validate()?;
    Ok(record)
}

/// Encode a top-level record with `_type` and `_version`.
pub fn encode<T: Record>(record: &T) -> Result<Value, CodecError> {
    let mut map = into_object(to_tagged_value(record)?)?;
    map.insert(VERSION_FIELD.to_string(), Value::from(RECORD_VERSION));
    Ok(Value::Object(map))
}

/// Decode a top-level record written by [`encode`].
pub fn decode<T: Record>(value: Value) -> Result<T, CodecError> {
    let mut map = into_object(value)?;
    let version = map
        .remove(VERSION_FIELD)
        .ok_or_else(|| CodecError::Malformed(format!("missing {}", VERSION_FIELD)))?;
    let version = version
        .as_u64()
        .ok_or_else(|| CodecError::Malformed(format!("{} is not an integer", VERSION_FIELD)))?;
    if version != RECORD_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    from_tagged_value(Value::Object(map))
}

/// Encode to a JSON string.
pub fn encode_to_string<T: Record>(record: &T) -> Result<String, CodecError> {
    serde_json::to_string(&encode(record)?).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Decode from a JSON string.
pub fn decode_from_str<T: Record>(input: &str) -> Result<T, CodecError> {
    let value: Value =
        serde_json::from_str(input).map_err(|e| CodecError::Malformed(e.to_string()))?;
    decode(value)
}

//! JSON transcoding of property values.
//!
//! Entity-row columns store their values as strings. Text and UUID kinds
//! are kept verbatim, scalars are written as plain JSON and `Object` kinds
//! as the tagged JSON form of [`Value`], so they decode to exactly the
//! value that was written.

use crate::error::{CodecError, CodecResult};
use crate::value::{Value, ValueKind};
use serde_json::{Map as JsonMap, Number, Value as Json};
use std::fmt;
use uuid::Uuid;

/// Encode/decode boundary between typed values and their stored text form.
pub trait DataTranscoder: Send + Sync + fmt::Debug {
    /// Encodes a value of the given kind to its stored text form.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented.
    fn encode(&self, value: &Value, kind: &ValueKind) -> CodecResult<String>;

    /// Decodes a stored text form into a value of the given kind.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not a valid encoding of `kind`.
    fn force_decode_from_json(&self, raw: &str, kind: &ValueKind) -> CodecResult<Value>;
}

/// Default [`DataTranscoder`] backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTranscoder;

impl JsonTranscoder {
    /// Creates a new transcoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DataTranscoder for JsonTranscoder {
    fn encode(&self, value: &Value, kind: &ValueKind) -> CodecResult<String> {
        match (kind, value) {
            (ValueKind::Object(_), value) => {
                serde_json::to_string(value).map_err(|e| CodecError::encoding_failed(e.to_string()))
            }
            (ValueKind::Text, Value::Text(s)) => Ok(s.clone()),
            (_, Value::Uuid(u)) => Ok(u.hyphenated().to_string()),
            (_, other) => serde_json::to_string(&to_json(other)?)
                .map_err(|e| CodecError::encoding_failed(e.to_string())),
        }
    }

    fn force_decode_from_json(&self, raw: &str, kind: &ValueKind) -> CodecResult<Value> {
        match kind {
            ValueKind::Text => Ok(Value::Text(raw.to_string())),
            ValueKind::Uuid => Uuid::parse_str(raw.trim_matches('"'))
                .map(Value::Uuid)
                .map_err(|e| CodecError::decoding_failed(format!("'{raw}' as uuid: {e}"))),
            ValueKind::Bool => match parse(raw)? {
                Json::Bool(b) => Ok(Value::Bool(b)),
                other => Err(mismatch(raw, kind, &other)),
            },
            ValueKind::Int => {
                let json = parse(raw)?;
                json.as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .map(Value::Int)
                    .ok_or_else(|| mismatch(raw, kind, &json))
            }
            ValueKind::Long | ValueKind::Counter => {
                let json = parse(raw)?;
                json.as_i64()
                    .map(Value::Long)
                    .ok_or_else(|| mismatch(raw, kind, &json))
            }
            ValueKind::Bytes => match parse(raw)? {
                Json::Array(items) => items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .and_then(|n| u8::try_from(n).ok())
                            .ok_or_else(|| mismatch(raw, kind, item))
                    })
                    .collect::<CodecResult<Vec<u8>>>()
                    .map(Value::Bytes),
                other => Err(mismatch(raw, kind, &other)),
            },
            ValueKind::Object(name) => serde_json::from_str(raw)
                .map_err(|e| CodecError::decoding_failed(format!("'{raw}' as {name}: {e}"))),
        }
    }
}

fn parse(raw: &str) -> CodecResult<Json> {
    serde_json::from_str(raw).map_err(|e| CodecError::decoding_failed(format!("'{raw}': {e}")))
}

fn mismatch(raw: &str, kind: &ValueKind, json: &Json) -> CodecError {
    CodecError::decoding_failed(format!("'{raw}' is not a {kind} (found {json})"))
}

fn to_json(value: &Value) -> CodecResult<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::Number(Number::from(*n)),
        Value::Long(n) => Json::Number(Number::from(*n)),
        Value::Text(s) => Json::String(s.clone()),
        Value::Uuid(u) => Json::String(u.hyphenated().to_string()),
        Value::Bytes(b) => Json::Array(b.iter().map(|x| Json::Number(Number::from(*x))).collect()),
        Value::List(items) => Json::Array(items.iter().map(to_json).collect::<CodecResult<_>>()?),
        Value::Set(items) => Json::Array(items.iter().map(to_json).collect::<CodecResult<_>>()?),
        Value::Map(entries) => {
            let mut object = JsonMap::new();
            for (k, v) in entries {
                let key = match k {
                    Value::Text(s) => s.clone(),
                    Value::Null | Value::List(_) | Value::Set(_) | Value::Map(_) => {
                        return Err(CodecError::encoding_failed(format!(
                            "map key of type {} cannot be a JSON key",
                            k.type_name()
                        )))
                    }
                    other => other.to_string(),
                };
                object.insert(key, to_json(v)?);
            }
            Json::Object(object)
        }
    })
}

//! Byte serializers for row keys and wide-row values.

use crate::error::{CodecError, CodecResult};
use crate::value::{Value, ValueKind};
use uuid::Uuid;

/// A byte codec for one scalar type.
///
/// Integers are fixed-width big-endian, strings are UTF-8 and UUIDs are
/// their 16 raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Serializer {
    /// One byte, 0 or 1.
    Bool,
    /// Four bytes, big-endian.
    Int,
    /// Eight bytes, big-endian.
    Long,
    /// UTF-8 bytes.
    String,
    /// Sixteen bytes.
    Uuid,
    /// Bytes as-is.
    Bytes,
}

impl Serializer {
    /// Selects the serializer for a declared kind.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedType`] for kinds without a native
    /// byte form (`Counter`, `Object`).
    pub fn infer(kind: &ValueKind) -> CodecResult<Self> {
        match kind {
            ValueKind::Bool => Ok(Serializer::Bool),
            ValueKind::Int => Ok(Serializer::Int),
            ValueKind::Long => Ok(Serializer::Long),
            ValueKind::Text => Ok(Serializer::String),
            ValueKind::Uuid => Ok(Serializer::Uuid),
            ValueKind::Bytes => Ok(Serializer::Bytes),
            ValueKind::Counter | ValueKind::Object(_) => {
                Err(CodecError::unsupported_type(kind.type_name()))
            }
        }
    }

    /// Returns the serializer's display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Serializer::Bool => "bool",
            Serializer::Int => "int",
            Serializer::Long => "long",
            Serializer::String => "string",
            Serializer::Uuid => "uuid",
            Serializer::Bytes => "bytes",
        }
    }

    /// Encodes a value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TypeMismatch`] if the value is not of this
    /// serializer's type.
    pub fn to_bytes(self, value: &Value) -> CodecResult<Vec<u8>> {
        match (self, value) {
            (Serializer::Bool, Value::Bool(b)) => Ok(vec![u8::from(*b)]),
            (Serializer::Int, Value::Int(n)) => Ok(n.to_be_bytes().to_vec()),
            (Serializer::Long, Value::Long(n)) => Ok(n.to_be_bytes().to_vec()),
            // Ints widen silently so Int-keyed counters and ids interoperate.
            (Serializer::Long, Value::Int(n)) => Ok(i64::from(*n).to_be_bytes().to_vec()),
            (Serializer::String, Value::Text(s)) => Ok(s.as_bytes().to_vec()),
            (Serializer::Uuid, Value::Uuid(u)) => Ok(u.as_bytes().to_vec()),
            (Serializer::Bytes, Value::Bytes(b)) => Ok(b.clone()),
            (_, other) => Err(CodecError::TypeMismatch {
                expected: self.name(),
                actual: other.type_name(),
            }),
        }
    }

    /// Decodes a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the byte length is wrong for a fixed-width type
    /// or a string is not valid UTF-8.
    pub fn from_bytes(self, bytes: &[u8]) -> CodecResult<Value> {
        match self {
            Serializer::Bool => match bytes {
                [b] => Ok(Value::Bool(*b != 0)),
                _ => Err(CodecError::InvalidLength {
                    expected: 1,
                    actual: bytes.len(),
                }),
            },
            Serializer::Int => {
                let array: [u8; 4] = fixed(bytes)?;
                Ok(Value::Int(i32::from_be_bytes(array)))
            }
            Serializer::Long => {
                let array: [u8; 8] = fixed(bytes)?;
                Ok(Value::Long(i64::from_be_bytes(array)))
            }
            Serializer::String => std::str::from_utf8(bytes)
                .map(|s| Value::Text(s.to_string()))
                .map_err(|_| CodecError::InvalidUtf8),
            Serializer::Uuid => {
                let array: [u8; 16] = fixed(bytes)?;
                Ok(Value::Uuid(Uuid::from_bytes(array)))
            }
            Serializer::Bytes => Ok(Value::Bytes(bytes.to_vec())),
        }
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> CodecResult<[u8; N]> {
    bytes.try_into().map_err(|_| CodecError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_supported_kinds() {
        assert_eq!(Serializer::infer(&ValueKind::Long).unwrap(), Serializer::Long);
        assert_eq!(Serializer::infer(&ValueKind::Text).unwrap(), Serializer::String);
        assert_eq!(Serializer::infer(&ValueKind::Uuid).unwrap(), Serializer::Uuid);
    }

    #[test]
    fn infer_rejects_counter_and_objects() {
        assert!(matches!(
            Serializer::infer(&ValueKind::Counter),
            Err(CodecError::UnsupportedType { .. })
        ));
        assert!(Serializer::infer(&ValueKind::Object("Address".into())).is_err());
    }

    #[test]
    fn long_is_big_endian() {
        let bytes = Serializer::Long.to_bytes(&Value::Long(1)).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn long_accepts_int() {
        let bytes = Serializer::Long.to_bytes(&Value::Int(5)).unwrap();
        assert_eq!(Serializer::Long.from_bytes(&bytes).unwrap(), Value::Long(5));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let err = Serializer::Uuid.to_bytes(&Value::text("nope")).unwrap_err();
        assert_eq!(
            err,
            CodecError::TypeMismatch {
                expected: "uuid",
                actual: "text"
            }
        );
    }

    #[test]
    fn wrong_width_is_rejected() {
        let err = Serializer::Int.from_bytes(&[1, 2]).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidLength {
                expected: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        assert_eq!(
            Serializer::String.from_bytes(&[0xff, 0xfe]).unwrap_err(),
            CodecError::InvalidUtf8
        );
    }

    #[test]
    fn uuid_keeps_identity() {
        let id = Uuid::new_v4();
        let bytes = Serializer::Uuid.to_bytes(&Value::Uuid(id)).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(Serializer::Uuid.from_bytes(&bytes).unwrap(), Value::Uuid(id));
    }
}

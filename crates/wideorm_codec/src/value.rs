//! Dynamic value type.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// A dynamic property value.
///
/// Every mapped property decodes to a `Value`. Values are totally ordered
/// and hashable so they can serve as composite components, map keys and
/// foreign keys. Floats are intentionally absent.
///
/// The serde form is externally tagged, with maps written as a list of
/// pairs so keys keep their type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// UTF-8 text.
    Text(String),
    /// UUID (time-based or random).
    Uuid(Uuid),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Ordered list.
    List(Vec<Value>),
    /// Set without duplicates.
    Set(BTreeSet<Value>),
    /// Map keyed by value.
    Map(#[serde(with = "entries")] BTreeMap<Value, Value>),
}

mod entries {
    use super::Value;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub(super) fn serialize<S: Serializer>(map: &BTreeMap<Value, Value>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<Value, Value>, D::Error> {
        Vec::<(Value, Value)>::deserialize(deserializer).map(|pairs| pairs.into_iter().collect())
    }
}

impl Value {
    /// Creates a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Returns the name of this value's variant.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
        }
    }

    /// Returns true if this is `Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as `i64` if it is an integer of either width.
    #[must_use]
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            Value::Int(n) => Some(i64::from(*n)),
            _ => None,
        }
    }

    /// Returns the value as a string slice if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a list slice if it is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the value as a set if it is a set.
    #[must_use]
    pub fn as_set(&self) -> Option<&BTreeSet<Value>> {
        match self {
            Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the value as a map if it is a map.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<Value, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Set(items) => f.debug_set().entries(items).finish(),
            Value::Map(entries) => f.debug_map().entries(entries).finish(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

/// Declared class of a mapped value.
///
/// Natively supported scalars have a direct byte [`crate::Serializer`];
/// counters are carried as 64-bit integers; everything else is an
/// `Object` stored in serialized (JSON) form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Boolean.
    Bool,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    Long,
    /// UTF-8 text.
    Text,
    /// UUID.
    Uuid,
    /// Raw bytes.
    Bytes,
    /// Distributed counter.
    Counter,
    /// Any other type, identified by name, stored in serialized form.
    Object(String),
}

impl ValueKind {
    /// Returns true for kinds with a native byte serializer.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            ValueKind::Bool
                | ValueKind::Int
                | ValueKind::Long
                | ValueKind::Text
                | ValueKind::Uuid
                | ValueKind::Bytes
        )
    }

    /// Returns the kind's display name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Text => "text",
            ValueKind::Uuid => "uuid",
            ValueKind::Bytes => "bytes",
            ValueKind::Counter => "counter",
            ValueKind::Object(name) => name,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

//! Mapped entities and accessor dispatch.
//!
//! A mapped type implements [`Entity`]: a by-name accessor table over its
//! fields. Proxies, loaders and persisters only ever see entities through
//! this trait and the entity metadata.

use crate::error::{CoreError, CoreResult};
use crate::proxy::EntityProxy;
use crate::wide_map::{JoinWideMap, WideMap};
use std::any::Any;
use std::fmt;
use wideorm_codec::Value;

/// A mapped entity instance.
///
/// `get` and `set` are keyed by property name. Implementations return
/// `None` from `get` for unset fields and reject unknown names in `set`
/// with [`CoreError::UnknownProperty`].
pub trait Entity: Any + fmt::Debug {
    /// Returns the mapped class name.
    fn class_name(&self) -> &'static str;

    /// Reads a property.
    fn get(&self, property: &str) -> Option<PropertyValue>;

    /// Writes a property.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown properties or values of the wrong shape.
    fn set(&mut self, property: &str, value: PropertyValue) -> CoreResult<()>;

    /// Upcasts for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Entity {
    /// Returns the concrete entity if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Returns the concrete entity if it is a `T`.
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// The value of one property as seen through the accessor table.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// Simple, list, set, map or counter value.
    Value(Value),
    /// One joined entity.
    Join(EntityProxy),
    /// Joined entities in list order.
    JoinList(Vec<EntityProxy>),
    /// Joined entities without duplicates.
    JoinSet(Vec<EntityProxy>),
    /// Joined entities by key.
    JoinMap(Vec<(Value, EntityProxy)>),
    /// Wide map handle.
    WideMap(WideMap),
    /// Join wide map handle.
    JoinWideMap(JoinWideMap),
}

impl PropertyValue {
    /// Returns the shape name, for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Value(v) => v.type_name(),
            PropertyValue::Join(_) => "join",
            PropertyValue::JoinList(_) => "join list",
            PropertyValue::JoinSet(_) => "join set",
            PropertyValue::JoinMap(_) => "join map",
            PropertyValue::WideMap(_) => "wide map",
            PropertyValue::JoinWideMap(_) => "join wide map",
        }
    }

    /// Returns true for a null value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Value(Value::Null))
    }

    /// Returns the plain value, if this is one.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropertyValue::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the single joined entity, if this is one.
    #[must_use]
    pub fn as_join(&self) -> Option<&EntityProxy> {
        match self {
            PropertyValue::Join(p) => Some(p),
            _ => None,
        }
    }

    /// Returns joined entities of a list or a set.
    #[must_use]
    pub fn as_join_list(&self) -> Option<&[EntityProxy]> {
        match self {
            PropertyValue::JoinList(items) | PropertyValue::JoinSet(items) => Some(items),
            _ => None,
        }
    }

    /// Returns joined entities by key.
    #[must_use]
    pub fn as_join_map(&self) -> Option<&[(Value, EntityProxy)]> {
        match self {
            PropertyValue::JoinMap(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the wide map handle.
    #[must_use]
    pub fn into_wide_map(self) -> Option<WideMap> {
        match self {
            PropertyValue::WideMap(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the join wide map handle.
    #[must_use]
    pub fn into_join_wide_map(self) -> Option<JoinWideMap> {
        match self {
            PropertyValue::JoinWideMap(m) => Some(m),
            _ => None,
        }
    }

    /// Converts to a plain value for a `set` implementation.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming `property` for any other shape.
    pub fn try_into_value(self, property: &str) -> CoreResult<Value> {
        match self {
            PropertyValue::Value(v) => Ok(v),
            other => Err(mismatch(property, "value", &other)),
        }
    }

    /// Converts to an optional joined entity; null clears it.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming `property` for any other shape.
    pub fn try_into_join(self, property: &str) -> CoreResult<Option<EntityProxy>> {
        match self {
            PropertyValue::Join(p) => Ok(Some(p)),
            PropertyValue::Value(Value::Null) => Ok(None),
            other => Err(mismatch(property, "join", &other)),
        }
    }

    /// Converts to joined entities of a list or a set; null empties it.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming `property` for any other shape.
    pub fn try_into_join_list(self, property: &str) -> CoreResult<Vec<EntityProxy>> {
        match self {
            PropertyValue::JoinList(items) | PropertyValue::JoinSet(items) => Ok(items),
            PropertyValue::Value(Value::Null) => Ok(Vec::new()),
            other => Err(mismatch(property, "join list", &other)),
        }
    }

    /// Converts to joined entities by key; null empties it.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming `property` for any other shape.
    pub fn try_into_join_map(self, property: &str) -> CoreResult<Vec<(Value, EntityProxy)>> {
        match self {
            PropertyValue::JoinMap(entries) => Ok(entries),
            PropertyValue::Value(Value::Null) => Ok(Vec::new()),
            other => Err(mismatch(property, "join map", &other)),
        }
    }
}

fn mismatch(property: &str, expected: &str, actual: &PropertyValue) -> CoreError {
    CoreError::validation(format!(
        "property {property} expects a {expected}, got a {}",
        actual.kind_name()
    ))
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        PropertyValue::Value(value)
    }
}

impl From<EntityProxy> for PropertyValue {
    fn from(proxy: EntityProxy) -> Self {
        PropertyValue::Join(proxy)
    }
}

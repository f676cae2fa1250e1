//! Cloneable handle on a managed entity.

use super::EntityInterceptor;
use crate::entity::{Entity, PropertyValue};
use crate::error::{CoreError, CoreResult};
use crate::metadata::EntityMeta;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use wideorm_codec::Value;

/// A managed entity.
///
/// Clones share one interceptor. Access is single-threaded; a re-entrant
/// access to the same proxy (for example from inside
/// [`EntityProxy::with_target`]) fails with an invalid state error instead
/// of panicking.
#[derive(Clone)]
pub struct EntityProxy {
    key: Value,
    meta: Arc<EntityMeta>,
    interceptor: Rc<RefCell<EntityInterceptor>>,
}

impl fmt::Debug for EntityProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityProxy")
            .field("class_name", &self.meta.class_name())
            .field("key", &self.key)
            .finish()
    }
}

impl EntityProxy {
    /// Wraps an interceptor.
    #[must_use]
    pub fn new(interceptor: EntityInterceptor) -> Self {
        Self {
            key: interceptor.key().clone(),
            meta: Arc::clone(interceptor.entity_meta()),
            interceptor: Rc::new(RefCell::new(interceptor)),
        }
    }

    /// Returns the primary key.
    #[must_use]
    pub fn primary_key(&self) -> &Value {
        &self.key
    }

    /// Returns the entity class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.meta.class_name()
    }

    /// Returns the entity metadata.
    #[must_use]
    pub fn entity_meta(&self) -> &Arc<EntityMeta> {
        &self.meta
    }

    /// Reads a property. See [`EntityInterceptor::get`].
    ///
    /// # Errors
    ///
    /// Returns the load error, or an invalid state error on re-entrant use.
    pub fn get(&self, property: &str) -> CoreResult<Option<PropertyValue>> {
        self.interceptor_mut()?.get(property)
    }

    /// Reads a plain property value; `None` if unset.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the property is not a plain value.
    pub fn get_value(&self, property: &str) -> CoreResult<Option<Value>> {
        self.get(property)?
            .map(|v| v.try_into_value(property))
            .transpose()
    }

    /// Writes a property. See [`EntityInterceptor::set`].
    ///
    /// # Errors
    ///
    /// Returns the validation error, or an invalid state error on
    /// re-entrant use.
    pub fn set(&self, property: &str, value: impl Into<PropertyValue>) -> CoreResult<()> {
        self.interceptor_mut()?.set(property, value.into())
    }

    /// Adds `delta` to a counter property and flushes it.
    ///
    /// # Errors
    ///
    /// See [`EntityInterceptor::increment_counter`].
    pub fn increment_counter(&self, property: &str, delta: i64) -> CoreResult<()> {
        self.interceptor()?.increment_counter(property, delta)
    }

    /// Runs `f` on the target entity downcast to `T`.
    ///
    /// Lazy properties that were never accessed are not loaded.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the target is not a `T`.
    pub fn with_target<T: Entity, R>(&self, f: impl FnOnce(&T) -> R) -> CoreResult<R> {
        let interceptor = self.interceptor()?;
        let target = interceptor.target().downcast_ref::<T>().ok_or_else(|| {
            CoreError::validation(format!(
                "proxy of {} does not wrap a {}",
                self.class_name(),
                std::any::type_name::<T>()
            ))
        })?;
        Ok(f(target))
    }

    /// Returns the names of changed properties in name order.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error on re-entrant use.
    pub fn dirty_properties(&self) -> CoreResult<Vec<String>> {
        let mut names: Vec<String> = self.interceptor()?.dirty_map().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Returns true if a lazy property has been loaded or written.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error on re-entrant use.
    pub fn is_loaded(&self, property: &str) -> CoreResult<bool> {
        Ok(self.interceptor()?.lazy_loaded().contains(property))
    }

    /// Returns true if both handles share one interceptor.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.interceptor, &b.interceptor)
    }

    pub(crate) fn interceptor(&self) -> CoreResult<Ref<'_, EntityInterceptor>> {
        self.interceptor.try_borrow().map_err(|_| self.busy())
    }

    pub(crate) fn interceptor_mut(&self) -> CoreResult<RefMut<'_, EntityInterceptor>> {
        self.interceptor.try_borrow_mut().map_err(|_| self.busy())
    }

    fn busy(&self) -> CoreError {
        CoreError::invalid_state(format!(
            "proxy of {} {} is already in use",
            self.class_name(),
            self.key
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ClickLog, Stack, User};

    #[test]
    fn clones_share_one_interceptor() {
        let stack = Stack::new();
        let proxy = stack.manage(User::with_id(1));
        let clone = proxy.clone();
        clone.set("name", Value::text("alice")).unwrap();

        assert!(EntityProxy::ptr_eq(&proxy, &clone));
        assert_eq!(proxy.dirty_properties().unwrap(), vec!["name"]);
        let name = proxy.with_target(|u: &User| u.name.clone()).unwrap();
        assert_eq!(name.as_deref(), Some("alice"));
    }

    #[test]
    fn reentrant_access_is_an_invalid_state() {
        let stack = Stack::new();
        let proxy = stack.manage(User::with_id(1));
        let inner = proxy.with_target(|_: &User| proxy.get("name")).unwrap();
        assert!(matches!(inner, Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn with_target_checks_the_type() {
        let stack = Stack::new();
        let proxy = stack.manage(User::with_id(1));
        let err = proxy.with_target(|_: &ClickLog| ()).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn debug_shows_class_and_key() {
        let stack = Stack::new();
        let proxy = stack.manage(User::with_id(7));
        let debug = format!("{proxy:?}");
        assert!(debug.contains("User"));
        assert!(debug.contains("Long(7)"));
    }
}

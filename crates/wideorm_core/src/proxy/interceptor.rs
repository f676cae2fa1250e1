//! Accessor interception.

use crate::composite_factory::CompositeFactory;
use crate::context::{PersistenceContext, SharedFlushContext};
use crate::entity::{Entity, PropertyValue};
use crate::error::{CoreError, CoreResult};
use crate::metadata::{EntityMeta, PropertyMeta, PropertyType};
use crate::operations::{EntityLoader, JoinEntityLoader};
use crate::options::Options;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};
use wideorm_codec::Value;

/// Intercepts property access on one managed entity.
///
/// # Invariants
///
/// - the primary key never changes
/// - a property is loaded at most once, then served from the target
/// - every dirty property is also marked as loaded, so a merge never
///   overwrites stored data with a value that was never read or written
pub struct EntityInterceptor {
    pub(super) target: Box<dyn Entity>,
    pub(super) context: PersistenceContext,
    pub(super) key: Value,
    pub(super) lazy_loaded: HashSet<String>,
    pub(super) dirty_map: HashMap<String, Arc<PropertyMeta>>,
    pub(super) loader: EntityLoader,
}

impl std::fmt::Debug for EntityInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dirty: Vec<_> = self.dirty_map.keys().collect();
        dirty.sort();
        f.debug_struct("EntityInterceptor")
            .field("class_name", &self.entity_meta().class_name())
            .field("key", &self.key)
            .field("dirty", &dirty)
            .finish_non_exhaustive()
    }
}

impl EntityInterceptor {
    /// Reads a property, loading it on first access unless the builder
    /// marked it as loaded.
    ///
    /// Counters are read from the store on every access. Wide maps return
    /// a fresh handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownProperty`] for unmapped names, or the
    /// load error.
    pub fn get(&mut self, property: &str) -> CoreResult<Option<PropertyValue>> {
        if self.entity_meta().is_id(property) {
            return Ok(Some(PropertyValue::Value(self.key.clone())));
        }
        let pm = Arc::clone(self.entity_meta().require_property(property)?);
        match pm.property_type() {
            PropertyType::Counter | PropertyType::WideMap | PropertyType::JoinWideMap => {
                self.loader.load_property(&self.context, &pm).map(Some)
            }
            _ => {
                if !self.lazy_loaded.contains(property) {
                    debug!(
                        class_name = self.entity_meta().class_name(),
                        key = %self.key,
                        property,
                        "lazy loading"
                    );
                    let value = self.loader.load_property(&self.context, &pm)?;
                    self.target.set(property, value)?;
                    self.lazy_loaded.insert(property.to_string());
                }
                Ok(self.target.get(property))
            }
        }
    }

    /// Writes a property and marks it dirty.
    ///
    /// # Errors
    ///
    /// Returns a validation error when changing the primary key, a counter
    /// or a wide map, and propagates the target's `set` error.
    pub fn set(&mut self, property: &str, value: PropertyValue) -> CoreResult<()> {
        if self.entity_meta().is_id(property) {
            return match value {
                PropertyValue::Value(v) if v == self.key => Ok(()),
                _ => Err(CoreError::validation(format!(
                    "cannot change the primary key of {} {}",
                    self.entity_meta().class_name(),
                    self.key
                ))),
            };
        }
        let pm = Arc::clone(self.entity_meta().require_property(property)?);
        match pm.property_type() {
            PropertyType::Counter => {
                return Err(CoreError::validation(format!(
                    "counter {property} changes through increment_counter"
                )))
            }
            PropertyType::WideMap | PropertyType::JoinWideMap => {
                return Err(CoreError::validation(format!(
                    "wide map {property} changes through its handle"
                )))
            }
            _ => {}
        }
        trace!(property, "dirty");
        self.target.set(property, value)?;
        self.lazy_loaded.insert(property.to_string());
        self.dirty_map.insert(property.to_string(), pm);
        Ok(())
    }

    /// Adds `delta` to a counter and flushes.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `property` is not a counter, or the
    /// flush error.
    pub fn increment_counter(&self, property: &str, delta: i64) -> CoreResult<()> {
        let pm = self.entity_meta().require_property(property)?;
        if !pm.property_type().is_counter() {
            return Err(CoreError::validation(format!("{property} is not a counter")));
        }
        let dao = self.context.get_counter_dao()?;
        let row = self.context.counter_row_key()?;
        let column = CompositeFactory::new().create_counter_column(pm);
        self.context
            .with_counter_mutator(|m| dao.increment(m, &row, column, delta))?;
        self.context.flush()
    }

    /// Returns the primary key.
    #[must_use]
    pub fn key(&self) -> &Value {
        &self.key
    }

    /// Returns the target entity.
    #[must_use]
    pub fn target(&self) -> &dyn Entity {
        self.target.as_ref()
    }

    /// Returns the persistence context.
    #[must_use]
    pub fn context(&self) -> &PersistenceContext {
        &self.context
    }

    /// Returns the entity metadata.
    #[must_use]
    pub fn entity_meta(&self) -> &Arc<EntityMeta> {
        self.context.entity_meta()
    }

    /// Returns the names of loaded properties.
    #[must_use]
    pub fn lazy_loaded(&self) -> &HashSet<String> {
        &self.lazy_loaded
    }

    /// Returns the changed properties.
    #[must_use]
    pub fn dirty_map(&self) -> &HashMap<String, Arc<PropertyMeta>> {
        &self.dirty_map
    }

    /// Returns the loader used for lazy properties.
    #[must_use]
    pub fn join_entity_loader(&self) -> &Arc<dyn JoinEntityLoader> {
        self.loader.join_entity_loader()
    }

    /// Takes the changed properties in name order, leaving none dirty.
    pub(crate) fn take_dirty(&mut self) -> Vec<Arc<PropertyMeta>> {
        let mut dirty: Vec<_> = self.dirty_map.drain().map(|(_, pm)| pm).collect();
        dirty.sort_by(|a, b| a.name().cmp(b.name()));
        dirty
    }

    /// Marks properties dirty again after a failed write of them.
    pub(crate) fn restore_dirty(&mut self, dirty: Vec<Arc<PropertyMeta>>) {
        for pm in dirty {
            self.dirty_map.entry(pm.name().to_string()).or_insert(pm);
        }
    }

    /// Swaps in a freshly loaded target, forgetting loads and changes.
    pub(crate) fn replace_target(&mut self, target: Box<dyn Entity>) {
        self.target = target;
        self.lazy_loaded.clear();
        self.dirty_map.clear();
    }

    /// Moves the interceptor onto the flush context and options of a new
    /// call.
    pub(crate) fn rebind(&mut self, flush_context: SharedFlushContext, options: Options) {
        self.context = self
            .context
            .clone()
            .with_flush_context(flush_context)
            .with_options(options);
    }

    /// Marks properties as loaded.
    pub(crate) fn mark_loaded<'a>(&mut self, properties: impl IntoIterator<Item = &'a str>) {
        self.lazy_loaded
            .extend(properties.into_iter().map(str::to_string));
    }

    /// Unwraps the target entity.
    #[must_use]
    pub fn into_target(self) -> Box<dyn Entity> {
        self.target
    }
}

//! Construction of interceptors.

use super::{EntityInterceptor, EntityProxy};
use crate::context::PersistenceContext;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::operations::{BatchJoinEntityLoader, EntityLoader, JoinEntityLoader};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Builds an [`EntityInterceptor`] around a target entity.
#[must_use]
pub struct EntityInterceptorBuilder {
    context: PersistenceContext,
    target: Box<dyn Entity>,
    lazy_loaded: HashSet<String>,
    join_entity_loader: Option<Arc<dyn JoinEntityLoader>>,
}

impl EntityInterceptorBuilder {
    /// Starts a builder.
    pub fn builder(context: PersistenceContext, target: Box<dyn Entity>) -> Self {
        Self {
            context,
            target,
            lazy_loaded: HashSet::new(),
            join_entity_loader: None,
        }
    }

    /// Marks properties as already loaded.
    pub fn lazy_loaded(mut self, properties: impl IntoIterator<Item = String>) -> Self {
        self.lazy_loaded.extend(properties);
        self
    }

    /// Marks every eagerly stored property as loaded.
    pub fn eager_loaded(mut self) -> Self {
        let meta = Arc::clone(self.context.entity_meta());
        self.lazy_loaded
            .extend(meta.eager_properties().map(|pm| pm.name().to_string()));
        self
    }

    /// Replaces the default [`BatchJoinEntityLoader`].
    pub fn join_entity_loader(mut self, loader: Arc<dyn JoinEntityLoader>) -> Self {
        self.join_entity_loader = Some(loader);
        self
    }

    /// Builds the interceptor.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the target is not an instance of the
    /// context's entity class, the entity declares no id, or the context
    /// lacks the DAO matching the entity's storage shape.
    pub fn build(self) -> CoreResult<EntityInterceptor> {
        let meta = self.context.entity_meta();
        let class_name = meta.class_name();
        debug!(class_name, key = %self.context.primary_key(), "building interceptor");

        if self.target.class_name() != class_name {
            return Err(CoreError::validation(format!(
                "target of class {} does not match metadata of {class_name}",
                self.target.class_name()
            )));
        }
        if meta.id_meta().is_none() {
            return Err(CoreError::validation(format!(
                "id metadata for {class_name} should not be null"
            )));
        }
        if meta.is_wide_row() {
            if self.context.wide_row_dao().is_none() {
                return Err(CoreError::validation(format!(
                    "column family dao for {class_name} should not be null"
                )));
            }
        } else if self.context.entity_dao().is_none() {
            return Err(CoreError::validation(format!(
                "entity dao for {class_name} should not be null"
            )));
        }

        let join_entity_loader = self
            .join_entity_loader
            .unwrap_or_else(|| Arc::new(BatchJoinEntityLoader::new()));
        let key = self.context.primary_key().clone();
        Ok(EntityInterceptor {
            target: self.target,
            context: self.context,
            key,
            lazy_loaded: self.lazy_loaded,
            dirty_map: HashMap::new(),
            loader: EntityLoader::new(join_entity_loader),
        })
    }

    /// Builds the interceptor and wraps it in a proxy.
    ///
    /// # Errors
    ///
    /// See [`Self::build`].
    pub fn build_proxy(self) -> CoreResult<EntityProxy> {
        self.build().map(EntityProxy::new)
    }
}

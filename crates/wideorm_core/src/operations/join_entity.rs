//! Batched materialization of joined entities.

use crate::context::PersistenceContext;
use crate::dao::EntityDao;
use crate::error::CoreResult;
use crate::metadata::EntityMeta;
use crate::operations::EntityLoader;
use crate::proxy::{EntityInterceptorBuilder, EntityProxy};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;
use wideorm_codec::Value;

/// Turns join keys into managed entities.
///
/// Called once per join property load with every key of the property.
/// Keys without a stored row are absent from the result.
pub trait JoinEntityLoader: Send + Sync + fmt::Debug {
    /// Loads the entities for `keys` of `join_meta` through `join_dao`.
    ///
    /// Child contexts are spawned from `context` so they share its flush
    /// context. The returned proxies load their own joins through
    /// `nested`, the loader installed on the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the read or the decoding fails.
    fn load_join_entities(
        &self,
        context: &PersistenceContext,
        join_meta: &Arc<EntityMeta>,
        keys: &[Value],
        join_dao: &EntityDao,
        nested: &Arc<dyn JoinEntityLoader>,
    ) -> CoreResult<HashMap<Value, EntityProxy>>;
}

/// Default loader: one multiget for all keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchJoinEntityLoader;

impl BatchJoinEntityLoader {
    /// Creates the loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl JoinEntityLoader for BatchJoinEntityLoader {
    fn load_join_entities(
        &self,
        context: &PersistenceContext,
        join_meta: &Arc<EntityMeta>,
        keys: &[Value],
        join_dao: &EntityDao,
        nested: &Arc<dyn JoinEntityLoader>,
    ) -> CoreResult<HashMap<Value, EntityProxy>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = join_dao.eager_load_entities(keys, context.read_consistency())?;
        let mut proxies = HashMap::with_capacity(rows.len());
        for (key, columns) in rows {
            if columns.is_empty() {
                continue;
            }
            let entity = EntityLoader::decode_entity(join_meta, &key, &columns)?;
            let child = context.new_persistence_context_for_key(Arc::clone(join_meta), key.clone())?;
            let proxy = EntityInterceptorBuilder::builder(child, entity)
                .eager_loaded()
                .join_entity_loader(Arc::clone(nested))
                .build_proxy()?;
            proxies.insert(key, proxy);
        }
        trace!(
            join_class = join_meta.class_name(),
            requested = keys.len(),
            found = proxies.len(),
            "join entities loaded"
        );
        Ok(proxies)
    }
}

//! Linked set of entity metadata.

use super::EntityMeta;
use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Every mapped entity of a persistence unit, keyed by class name.
///
/// Building the registry links each join property to its target metadata.
/// The registry owns the metadata; join links are weak.
#[derive(Debug, Default)]
pub struct EntityMetaRegistry {
    metas: BTreeMap<String, Arc<EntityMeta>>,
}

impl EntityMetaRegistry {
    /// Registers and links entity metadata.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a class is registered twice, an
    /// entity declares no id, or a join targets an unregistered class or a
    /// wide row entity.
    pub fn new(metas: impl IntoIterator<Item = EntityMeta>) -> CoreResult<Self> {
        let mut by_class = BTreeMap::new();
        for meta in metas {
            meta.require_id_meta()?;
            let class_name = meta.class_name().to_string();
            if by_class.insert(class_name.clone(), Arc::new(meta)).is_some() {
                return Err(CoreError::configuration(format!(
                    "entity class {class_name} is registered twice"
                )));
            }
        }

        for meta in by_class.values() {
            for pm in meta.properties() {
                let Some(join) = pm.join_properties() else {
                    continue;
                };
                let target = by_class.get(join.entity_class()).ok_or_else(|| {
                    CoreError::configuration(format!(
                        "join target {} of {}.{} is not a registered entity",
                        join.entity_class(),
                        meta.class_name(),
                        pm.name()
                    ))
                })?;
                if target.is_wide_row() {
                    return Err(CoreError::configuration(format!(
                        "{}.{} cannot join the wide row entity {}",
                        meta.class_name(),
                        pm.name(),
                        target.class_name()
                    )));
                }
                join.link(target);
            }
        }

        debug!(entities = by_class.len(), "entity metadata registered");
        Ok(Self { metas: by_class })
    }

    /// Returns the metadata of a class.
    #[must_use]
    pub fn get(&self, class_name: &str) -> Option<&Arc<EntityMeta>> {
        self.metas.get(class_name)
    }

    /// Returns the metadata of a class.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unknown classes.
    pub fn require(&self, class_name: &str) -> CoreResult<&Arc<EntityMeta>> {
        self.get(class_name).ok_or_else(|| {
            CoreError::configuration(format!("no entity metadata registered for {class_name}"))
        })
    }

    /// Iterates over the metadata in class name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityMeta>> {
        self.metas.values()
    }

    /// Returns true if any entity has a counter.
    #[must_use]
    pub fn has_counter(&self) -> bool {
        self.metas.values().any(|meta| meta.has_counter())
    }

    /// Returns the number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metas.len()
    }

    /// Returns true if no entity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }
}

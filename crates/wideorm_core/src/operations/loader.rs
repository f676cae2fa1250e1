//! Loading of entities and of their lazy properties.

use super::{discriminator, property_columns, JoinEntityLoader, JoinLoader};
use crate::composite_factory::CompositeFactory;
use crate::context::PersistenceContext;
use crate::dao::EntityColumns;
use crate::entity::{Entity, PropertyValue};
use crate::error::{CoreError, CoreResult};
use crate::metadata::{EntityMeta, PropertyMeta, PropertyType};
use crate::wide_map::{JoinWideMap, WideMap};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};
use wideorm_codec::Value;

/// Materializes entities from their eager columns and loads lazy
/// properties on demand.
#[derive(Debug, Clone)]
pub struct EntityLoader {
    composite_factory: CompositeFactory,
    join_loader: JoinLoader,
}

impl EntityLoader {
    /// Creates a loader resolving joins through `join_entity_loader`.
    #[must_use]
    pub fn new(join_entity_loader: Arc<dyn JoinEntityLoader>) -> Self {
        Self {
            composite_factory: CompositeFactory::new(),
            join_loader: JoinLoader::new(join_entity_loader),
        }
    }

    /// Returns the join entity loader.
    #[must_use]
    pub fn join_entity_loader(&self) -> &Arc<dyn JoinEntityLoader> {
        self.join_loader.join_entity_loader()
    }

    /// Loads the entity of the context's primary key.
    ///
    /// Wide-row entities have no row of their own and always load as an
    /// instance holding only the key. Regular entities load as `None` when
    /// their row does not exist.
    ///
    /// # Errors
    ///
    /// Returns read or decode errors.
    pub fn load(&self, context: &PersistenceContext) -> CoreResult<Option<Box<dyn Entity>>> {
        let meta = context.entity_meta();
        let key = context.primary_key();
        if meta.is_wide_row() {
            let mut entity = meta.instantiate();
            entity.set(meta.require_id_meta()?.name(), PropertyValue::Value(key.clone()))?;
            return Ok(Some(entity));
        }
        let columns = context
            .require_entity_dao()?
            .eager_load_entity(key, context.read_consistency())?;
        if columns.is_empty() {
            debug!(class_name = meta.class_name(), %key, "entity not found");
            return Ok(None);
        }
        Self::decode_entity(meta, key, &columns).map(Some)
    }

    /// Builds an entity from its eager columns.
    ///
    /// Columns of properties the metadata no longer maps are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] if a stored value does not decode.
    pub fn decode_entity(meta: &EntityMeta, key: &Value, columns: &EntityColumns) -> CoreResult<Box<dyn Entity>> {
        let mut entity = meta.instantiate();
        entity.set(meta.require_id_meta()?.name(), PropertyValue::Value(key.clone()))?;
        let simple_flag = PropertyType::Simple.flag_value();
        for (column, raw) in columns {
            if column.get(0) != Some(&simple_flag) {
                continue;
            }
            let Some(name) = column.get(1).and_then(Value::as_text) else {
                continue;
            };
            match meta.property(name) {
                Some(pm) if pm.property_type() == PropertyType::Simple => {
                    entity.set(name, PropertyValue::Value(pm.decode_value(raw)?))?;
                }
                _ => warn!(class_name = meta.class_name(), property = name, "skipping unmapped column"),
            }
        }
        Ok(entity)
    }

    /// Loads one property of the context's entity from the store.
    ///
    /// Empty collections and missing joins load as null. Counters load
    /// their current value; wide maps load as handles.
    ///
    /// # Errors
    ///
    /// Returns read or decode errors, or a validation error for the id.
    pub fn load_property(&self, context: &PersistenceContext, pm: &Arc<PropertyMeta>) -> CoreResult<PropertyValue> {
        let value = match pm.property_type() {
            PropertyType::Simple => {
                let column = self.composite_factory.create_for_simple(pm);
                let raw = context.require_entity_dao()?.get_value(
                    context.primary_key(),
                    &column,
                    context.read_consistency(),
                )?;
                PropertyValue::Value(raw.map_or(Ok(Value::Null), |raw| pm.decode_value(&raw))?)
            }
            PropertyType::List => {
                let items = property_columns(&self.composite_factory, context, pm)?
                    .iter()
                    .map(|(_, raw)| pm.decode_value(raw))
                    .collect::<CoreResult<Vec<_>>>()?;
                PropertyValue::Value(if items.is_empty() { Value::Null } else { Value::List(items) })
            }
            PropertyType::Set => {
                let items = property_columns(&self.composite_factory, context, pm)?
                    .iter()
                    .map(|(column, _)| pm.decode_value(discriminator(pm, column)?))
                    .collect::<CoreResult<BTreeSet<_>>>()?;
                PropertyValue::Value(if items.is_empty() { Value::Null } else { Value::Set(items) })
            }
            PropertyType::Map => {
                let entries = property_columns(&self.composite_factory, context, pm)?
                    .iter()
                    .map(|(column, raw)| Ok((pm.decode_key(discriminator(pm, column)?)?, pm.decode_value(raw)?)))
                    .collect::<CoreResult<BTreeMap<_, _>>>()?;
                PropertyValue::Value(if entries.is_empty() { Value::Null } else { Value::Map(entries) })
            }
            PropertyType::JoinSimple => self
                .join_loader
                .load_join_simple_property(context, pm)?
                .map_or(PropertyValue::Value(Value::Null), PropertyValue::Join),
            PropertyType::JoinList => {
                PropertyValue::JoinList(self.join_loader.load_join_list_property(context, pm)?)
            }
            PropertyType::JoinSet => {
                PropertyValue::JoinSet(self.join_loader.load_join_set_property(context, pm)?)
            }
            PropertyType::JoinMap => {
                PropertyValue::JoinMap(self.join_loader.load_join_map_property(context, pm)?)
            }
            PropertyType::Counter => {
                let dao = context.get_counter_dao()?;
                let column = self.composite_factory.create_counter_column(pm);
                let count = dao.get_counter(&context.counter_row_key()?, &column, context.read_consistency())?;
                PropertyValue::Value(Value::Long(count))
            }
            PropertyType::WideMap => PropertyValue::WideMap(WideMap::new(context.clone(), Arc::clone(pm))?),
            PropertyType::JoinWideMap => PropertyValue::JoinWideMap(JoinWideMap::new(
                context.clone(),
                Arc::clone(pm),
                self.join_loader.clone(),
            )?),
            PropertyType::Id | PropertyType::StartEager => {
                return Err(CoreError::validation(format!(
                    "{} is not a loadable property",
                    pm.name()
                )))
            }
        };
        Ok(value)
    }
}

//! Registry of every DAO, built once from the entity metadata.

use crate::config::ConfigurationContext;
use crate::dao::{CounterDao, EntityDao, WideRowDao};
use crate::error::{CoreError, CoreResult};
use crate::metadata::{EntityMeta, EntityMetaRegistry, PropertyMeta, PropertyType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use wideorm_codec::{Serializer, ValueKind};
use wideorm_storage::ColumnStore;

/// Lookup of DAOs by column family.
///
/// Immutable after construction and shared by every context.
#[derive(Debug, Default)]
pub struct DaoContext {
    entity_daos: HashMap<String, Arc<EntityDao>>,
    wide_row_daos: HashMap<String, Arc<WideRowDao>>,
    counter_dao: Option<Arc<CounterDao>>,
}

impl DaoContext {
    /// Returns the entity DAO of a column family.
    #[must_use]
    pub fn find_entity_dao(&self, column_family: &str) -> Option<Arc<EntityDao>> {
        self.entity_daos.get(column_family).cloned()
    }

    /// Returns the wide-row DAO of a column family.
    #[must_use]
    pub fn find_wide_row_dao(&self, column_family: &str) -> Option<Arc<WideRowDao>> {
        self.wide_row_daos.get(column_family).cloned()
    }

    /// Returns the counter DAO, if any entity has counters.
    #[must_use]
    pub fn get_counter_dao(&self) -> Option<Arc<CounterDao>> {
        self.counter_dao.clone()
    }

    /// Returns the number of entity DAOs.
    #[must_use]
    pub fn entity_dao_count(&self) -> usize {
        self.entity_daos.len()
    }

    /// Returns the number of wide-row DAOs.
    #[must_use]
    pub fn wide_row_dao_count(&self) -> usize {
        self.wide_row_daos.len()
    }
}

/// Builds a [`DaoContext`] from entity metadata.
///
/// - one entity DAO per non wide-row entity table, keyed by the id type
/// - one wide-row DAO per wide-row entity and per wide map property
/// - one counter DAO when any entity has counters
///
/// A column family maps to exactly one DAO kind; sharing one between an
/// entity table and a wide row, or between tables with different key
/// types, is a configuration error.
#[derive(Debug, Default)]
pub struct DaoContextBuilder {
    entity_daos: HashMap<String, Arc<EntityDao>>,
    wide_row_daos: HashMap<String, Arc<WideRowDao>>,
}

impl DaoContextBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unsupported id or key types,
    /// incompatible shared tables and clashes between entity and wide-row
    /// column families.
    pub fn build(
        mut self,
        store: &Arc<dyn ColumnStore>,
        metas: &EntityMetaRegistry,
        config: &ConfigurationContext,
        has_counter: bool,
    ) -> CoreResult<DaoContext> {
        for meta in metas.iter() {
            let id_serializer = Self::key_serializer(meta)?;
            if meta.is_wide_row() {
                debug!(class_name = meta.class_name(), "wide row entity, no entity dao");
            } else {
                self.build_entity_dao(store, meta, id_serializer, config)?;
            }
            for pm in meta.properties() {
                match pm.property_type() {
                    PropertyType::WideMap => {
                        let value = Self::value_serializer(pm.value_kind());
                        self.build_wide_row_dao(store, meta, pm, id_serializer, value, config)?;
                    }
                    PropertyType::JoinWideMap => {
                        let join_meta = pm.join_entity_meta()?;
                        let value = Self::key_serializer(&join_meta)?;
                        self.build_wide_row_dao(store, meta, pm, id_serializer, value, config)?;
                    }
                    _ => {}
                }
            }
            if meta.is_wide_row() && !self.wide_row_daos.contains_key(meta.table_name()) {
                return Err(CoreError::configuration(format!(
                    "wide row entity {} has no wide map stored in its table {}",
                    meta.class_name(),
                    meta.table_name()
                )));
            }
        }

        let counter_dao = has_counter.then(|| {
            Arc::new(CounterDao::new(
                Arc::clone(config.consistency_policy()),
                Arc::clone(store),
            ))
        });

        debug!(
            entity_daos = self.entity_daos.len(),
            wide_row_daos = self.wide_row_daos.len(),
            counter = has_counter,
            "dao context built"
        );
        Ok(DaoContext {
            entity_daos: self.entity_daos,
            wide_row_daos: self.wide_row_daos,
            counter_dao,
        })
    }

    fn key_serializer(meta: &EntityMeta) -> CoreResult<Serializer> {
        let kind = meta.id_kind()?;
        Serializer::infer(kind).map_err(|_| {
            CoreError::configuration(format!(
                "id type {kind} of entity {} is not supported as a row key",
                meta.class_name()
            ))
        })
    }

    fn value_serializer(kind: &ValueKind) -> Serializer {
        match kind {
            ValueKind::Counter => Serializer::Long,
            kind => Serializer::infer(kind).unwrap_or(Serializer::String),
        }
    }

    fn build_entity_dao(
        &mut self,
        store: &Arc<dyn ColumnStore>,
        meta: &EntityMeta,
        key_serializer: Serializer,
        config: &ConfigurationContext,
    ) -> CoreResult<()> {
        let table = meta.table_name();
        if self.wide_row_daos.contains_key(table) {
            return Err(Self::clash(table, meta.class_name()));
        }
        if let Some(existing) = self.entity_daos.get(table) {
            if existing.key_serializer() != key_serializer {
                return Err(CoreError::configuration(format!(
                    "table {table} is shared with incompatible id types {} and {} ({})",
                    existing.key_serializer().name(),
                    key_serializer.name(),
                    meta.class_name()
                )));
            }
            return Ok(());
        }
        let dao = EntityDao::new(
            table,
            key_serializer,
            Arc::clone(config.consistency_policy()),
            Arc::clone(store),
        );
        self.entity_daos.insert(table.to_string(), Arc::new(dao));
        Ok(())
    }

    fn build_wide_row_dao(
        &mut self,
        store: &Arc<dyn ColumnStore>,
        meta: &EntityMeta,
        pm: &PropertyMeta,
        key_serializer: Serializer,
        value_serializer: Serializer,
        config: &ConfigurationContext,
    ) -> CoreResult<()> {
        let column_family = pm.external_column_family().ok_or_else(|| {
            CoreError::configuration(format!(
                "wide map {}.{} has no column family",
                meta.class_name(),
                pm.name()
            ))
        })?;
        if self.entity_daos.contains_key(column_family) {
            return Err(Self::clash(column_family, meta.class_name()));
        }
        if let Some(existing) = self.wide_row_daos.get(column_family) {
            if existing.key_serializer() != key_serializer
                || existing.value_serializer() != value_serializer
            {
                return Err(CoreError::configuration(format!(
                    "column family {column_family} is shared by wide maps with incompatible types ({}.{})",
                    meta.class_name(),
                    pm.name()
                )));
            }
            return Ok(());
        }
        let dao = WideRowDao::new(
            column_family,
            key_serializer,
            value_serializer,
            Arc::clone(config.consistency_policy()),
            Arc::clone(store),
        );
        self.wide_row_daos
            .insert(column_family.to_string(), Arc::new(dao));
        Ok(())
    }

    fn clash(column_family: &str, class_name: &str) -> CoreError {
        CoreError::configuration(format!(
            "column family {column_family} is used both as an entity table and a wide row ({class_name})"
        ))
    }
}

//! Per-entity operation context.

use super::{DaoContext, SharedFlushContext};
use crate::config::{ConfigurationContext, FlushStrategy};
use crate::dao::{CounterDao, EntityDao, Mutator, WideRowDao};
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::metadata::EntityMeta;
use crate::options::Options;
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;
use wideorm_codec::Value;
use wideorm_storage::ConsistencyLevel;

/// The DAO serving an entity's own table.
#[derive(Debug, Clone)]
pub enum TableDao {
    /// Regular entity table.
    Entity(Arc<EntityDao>),
    /// Wide-row entity table.
    WideRow(Arc<WideRowDao>),
}

/// Everything one operation on one entity instance needs.
///
/// Couples the entity metadata, the shared configuration and DAO registry,
/// the flush context of the current unit of work and the immutable primary
/// key. Contexts spawned for joined entities share the parent's flush
/// context, so the whole tree flushes together.
#[derive(Debug, Clone)]
pub struct PersistenceContext {
    entity_meta: Arc<EntityMeta>,
    config: Arc<ConfigurationContext>,
    dao_context: Arc<DaoContext>,
    flush_context: SharedFlushContext,
    primary_key: Value,
    table_dao: TableDao,
    options: Options,
}

impl PersistenceContext {
    /// Creates a context for an entity instance, reading its primary key.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the entity has no primary key, or a
    /// configuration error if no DAO serves its table.
    pub fn for_entity(
        entity_meta: Arc<EntityMeta>,
        config: Arc<ConfigurationContext>,
        dao_context: Arc<DaoContext>,
        flush_context: SharedFlushContext,
        entity: &dyn Entity,
    ) -> CoreResult<Self> {
        let primary_key = Self::read_primary_key(&entity_meta, entity)?;
        Self::for_key(entity_meta, config, dao_context, flush_context, primary_key)
    }

    /// Creates a context for a primary key.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a null key, or a configuration error
    /// if no DAO serves the entity table.
    pub fn for_key(
        entity_meta: Arc<EntityMeta>,
        config: Arc<ConfigurationContext>,
        dao_context: Arc<DaoContext>,
        flush_context: SharedFlushContext,
        primary_key: Value,
    ) -> CoreResult<Self> {
        if primary_key.is_null() {
            return Err(CoreError::validation(format!(
                "primary key of {} must not be null",
                entity_meta.class_name()
            )));
        }
        trace!(
            class_name = entity_meta.class_name(),
            key = %primary_key,
            "persistence context created"
        );
        let table_dao = Self::init_daos(&entity_meta, &dao_context)?;
        Ok(Self {
            entity_meta,
            config,
            dao_context,
            flush_context,
            primary_key,
            table_dao,
            options: Options::default(),
        })
    }

    fn read_primary_key(meta: &EntityMeta, entity: &dyn Entity) -> CoreResult<Value> {
        let id_meta = meta.require_id_meta()?;
        match entity.get(id_meta.name()) {
            Some(value) => value.try_into_value(id_meta.name()),
            None => Ok(Value::Null),
        }
    }

    fn init_daos(meta: &EntityMeta, daos: &DaoContext) -> CoreResult<TableDao> {
        let table = meta.table_name();
        let dao = if meta.is_wide_row() {
            daos.find_wide_row_dao(table).map(TableDao::WideRow)
        } else {
            daos.find_entity_dao(table).map(TableDao::Entity)
        };
        dao.ok_or_else(|| {
            CoreError::configuration(format!(
                "no dao registered for table {table} of {}",
                meta.class_name()
            ))
        })
    }

    /// Spawns a context for a joined entity instance sharing this flush
    /// context.
    ///
    /// # Errors
    ///
    /// Same as [`Self::for_entity`].
    pub fn new_persistence_context(
        &self,
        join_meta: Arc<EntityMeta>,
        join_entity: &dyn Entity,
    ) -> CoreResult<Self> {
        trace!(join_class = join_meta.class_name(), "spawning context for join entity");
        let context = Self::for_entity(
            join_meta,
            Arc::clone(&self.config),
            Arc::clone(&self.dao_context),
            Rc::clone(&self.flush_context),
            join_entity,
        )?;
        Ok(context.with_options(self.options.duplicate_without_ttl_and_timestamp()))
    }

    /// Spawns a context for a joined primary key sharing this flush
    /// context.
    ///
    /// # Errors
    ///
    /// Same as [`Self::for_key`].
    pub fn new_persistence_context_for_key(
        &self,
        join_meta: Arc<EntityMeta>,
        join_key: Value,
    ) -> CoreResult<Self> {
        trace!(join_class = join_meta.class_name(), key = %join_key, "spawning context for join key");
        let context = Self::for_key(
            join_meta,
            Arc::clone(&self.config),
            Arc::clone(&self.dao_context),
            Rc::clone(&self.flush_context),
            join_key,
        )?;
        Ok(context.with_options(self.options.duplicate_without_ttl_and_timestamp()))
    }

    /// Replaces the call options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Moves the context onto another flush context.
    #[must_use]
    pub(crate) fn with_flush_context(mut self, flush_context: SharedFlushContext) -> Self {
        self.flush_context = flush_context;
        self
    }

    /// Returns the call options.
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Returns the read consistency override of the call.
    #[must_use]
    pub fn read_consistency(&self) -> Option<ConsistencyLevel> {
        self.options.consistency_level()
    }

    /// Returns the entity metadata.
    #[must_use]
    pub fn entity_meta(&self) -> &Arc<EntityMeta> {
        &self.entity_meta
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<ConfigurationContext> {
        &self.config
    }

    /// Returns the DAO registry.
    #[must_use]
    pub fn dao_context(&self) -> &Arc<DaoContext> {
        &self.dao_context
    }

    /// Returns the shared flush context.
    #[must_use]
    pub fn flush_context(&self) -> &SharedFlushContext {
        &self.flush_context
    }

    /// Returns the primary key.
    #[must_use]
    pub fn primary_key(&self) -> &Value {
        &self.primary_key
    }

    /// Returns true for wide-row entities.
    #[must_use]
    pub fn is_wide_row(&self) -> bool {
        self.entity_meta.is_wide_row()
    }

    /// Returns the DAO of the entity's own table.
    #[must_use]
    pub fn table_dao(&self) -> &TableDao {
        &self.table_dao
    }

    /// Returns the entity DAO of a regular entity.
    #[must_use]
    pub fn entity_dao(&self) -> Option<&Arc<EntityDao>> {
        match &self.table_dao {
            TableDao::Entity(dao) => Some(dao),
            TableDao::WideRow(_) => None,
        }
    }

    /// Returns the wide-row DAO of a wide-row entity.
    #[must_use]
    pub fn wide_row_dao(&self) -> Option<&Arc<WideRowDao>> {
        match &self.table_dao {
            TableDao::WideRow(dao) => Some(dao),
            TableDao::Entity(_) => None,
        }
    }

    /// Returns the entity DAO.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error for wide-row entities.
    pub fn require_entity_dao(&self) -> CoreResult<&Arc<EntityDao>> {
        self.entity_dao().ok_or_else(|| {
            CoreError::invalid_state(format!(
                "wide row entity {} has no entity row",
                self.entity_meta.class_name()
            ))
        })
    }

    /// Looks up an entity DAO by column family.
    #[must_use]
    pub fn find_entity_dao(&self, column_family: &str) -> Option<Arc<EntityDao>> {
        self.dao_context.find_entity_dao(column_family)
    }

    /// Looks up a wide-row DAO by column family.
    #[must_use]
    pub fn find_wide_row_dao(&self, column_family: &str) -> Option<Arc<WideRowDao>> {
        self.dao_context.find_wide_row_dao(column_family)
    }

    /// Returns the counter DAO.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no entity declares a counter.
    pub fn get_counter_dao(&self) -> CoreResult<Arc<CounterDao>> {
        self.dao_context
            .get_counter_dao()
            .ok_or_else(|| CoreError::configuration("no counter dao; no entity declares a counter"))
    }

    /// Returns this instance's counter row key.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary key cannot be encoded.
    pub fn counter_row_key(&self) -> CoreResult<Value> {
        let key_json = self
            .entity_meta
            .require_id_meta()?
            .encode_value(&self.primary_key)?;
        Ok(CounterDao::row_key(self.entity_meta.class_name(), &key_json))
    }

    /// Runs `f` on the entity mutator of a column family.
    ///
    /// `f` must not touch the flush context.
    ///
    /// # Errors
    ///
    /// Propagates mutator lookup errors and the error of `f`.
    pub fn with_entity_mutator<R>(
        &self,
        column_family: &str,
        f: impl FnOnce(&mut Mutator) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut flush = self.flush_context.borrow_mut();
        f(flush.get_entity_mutator(column_family)?)
    }

    /// Runs `f` on the wide-row mutator of a column family.
    ///
    /// # Errors
    ///
    /// Propagates mutator lookup errors and the error of `f`.
    pub fn with_wide_row_mutator<R>(
        &self,
        column_family: &str,
        f: impl FnOnce(&mut Mutator) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut flush = self.flush_context.borrow_mut();
        f(flush.get_wide_row_mutator(column_family)?)
    }

    /// Runs `f` on the wide-row mutator of the entity's own table.
    ///
    /// # Errors
    ///
    /// Propagates mutator lookup errors and the error of `f`.
    pub fn with_current_column_family_mutator<R>(
        &self,
        f: impl FnOnce(&mut Mutator) -> CoreResult<R>,
    ) -> CoreResult<R> {
        self.with_wide_row_mutator(self.entity_meta.table_name(), f)
    }

    /// Runs `f` on the counter mutator.
    ///
    /// # Errors
    ///
    /// Propagates mutator lookup errors and the error of `f`.
    pub fn with_counter_mutator<R>(&self, f: impl FnOnce(&mut Mutator) -> CoreResult<R>) -> CoreResult<R> {
        let mut flush = self.flush_context.borrow_mut();
        f(flush.get_counter_mutator()?)
    }

    /// Ends an operation on the shared flush context.
    ///
    /// The call's consistency level becomes the write level of the flush.
    /// A batch keeps its level when the call names none.
    ///
    /// # Errors
    ///
    /// See [`super::FlushContext::flush`].
    pub fn flush(&self) -> CoreResult<()> {
        let mut flush = self.flush_context.borrow_mut();
        match (flush.strategy(), self.options.consistency_level()) {
            (FlushStrategy::Batch, None) => {}
            (_, level) => flush.set_consistency_level(level),
        }
        flush.flush()
    }
}

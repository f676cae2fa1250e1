//! Handles on wide map properties.
//!
//! A wide map lives in its own column family, one row per owning entity,
//! one column per entry. Handles write through the owner's flush context
//! and flush after every write.

use crate::composite_factory::CompositeFactory;
use crate::context::PersistenceContext;
use crate::dao::WideRowDao;
use crate::error::{CoreError, CoreResult};
use crate::metadata::PropertyMeta;
use crate::operations::{EntityPersister, JoinLoader};
use crate::options::Options;
use crate::proxy::EntityProxy;
use std::sync::Arc;
use tracing::trace;
use wideorm_codec::{Composite, Value, ValueKind};

fn wide_row_dao(context: &PersistenceContext, pm: &PropertyMeta) -> CoreResult<Arc<WideRowDao>> {
    let column_family = pm.external_column_family().ok_or_else(|| {
        CoreError::configuration(format!("wide map {} has no column family", pm.name()))
    })?;
    context.find_wide_row_dao(column_family).ok_or_else(|| {
        CoreError::configuration(format!("no wide row dao for {column_family} of {}", pm.name()))
    })
}

fn entry_key(pm: &PropertyMeta, column: &Composite) -> CoreResult<Value> {
    column.get(0).cloned().ok_or_else(|| {
        CoreError::invalid_state(format!("empty column name in wide map {}", pm.name()))
    })
}

fn write_options(context: &PersistenceContext) -> Options {
    context.options().duplicate_without_ttl_and_timestamp()
}

/// A wide map of plain values.
#[derive(Debug, Clone)]
pub struct WideMap {
    context: PersistenceContext,
    property: Arc<PropertyMeta>,
    dao: Arc<WideRowDao>,
    composite_factory: CompositeFactory,
}

impl WideMap {
    pub(crate) fn new(context: PersistenceContext, property: Arc<PropertyMeta>) -> CoreResult<Self> {
        let dao = wide_row_dao(&context, &property)?;
        Ok(Self {
            context,
            property,
            dao,
            composite_factory: CompositeFactory::new(),
        })
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.property.name()
    }

    /// Inserts or overwrites an entry.
    ///
    /// # Errors
    ///
    /// Returns encoding or flush errors.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> CoreResult<()> {
        self.insert_with_options(key, value, write_options(&self.context))
    }

    /// Inserts or overwrites an entry with a ttl, timestamp or consistency.
    ///
    /// # Errors
    ///
    /// Returns encoding or flush errors.
    pub fn insert_with_options(
        &self,
        key: impl Into<Value>,
        value: impl Into<Value>,
        options: Options,
    ) -> CoreResult<()> {
        let key = key.into();
        let stored = self.to_stored(&value.into())?;
        trace!(property = self.name(), %key, "wide map insert");
        let column = self.composite_factory.create_for_wide_map(&key);
        let row = self.context.primary_key();
        self.context.with_wide_row_mutator(self.dao.column_family(), |m| {
            self.dao.insert_column(m, row, column, &stored, &options)
        })?;
        self.context.clone().with_options(options).flush()
    }

    /// Reads one entry.
    ///
    /// # Errors
    ///
    /// Returns read or decode errors.
    pub fn get(&self, key: impl Into<Value>) -> CoreResult<Option<Value>> {
        let column = self.composite_factory.create_for_wide_map(&key.into());
        self.dao
            .get_value(self.context.primary_key(), &column, self.context.read_consistency())?
            .map(|stored| self.from_stored(stored))
            .transpose()
    }

    /// Reads entries between optional inclusive bounds, in key order or
    /// reversed. Bounds are given in walk order.
    ///
    /// # Errors
    ///
    /// Returns read or decode errors.
    pub fn find(
        &self,
        start: Option<&Value>,
        end: Option<&Value>,
        limit: usize,
        reversed: bool,
    ) -> CoreResult<Vec<(Value, Value)>> {
        let (start, end) = self.composite_factory.create_wide_map_bounds(start, end);
        self.dao
            .find_columns_range(
                self.context.primary_key(),
                start,
                end,
                reversed,
                limit,
                self.context.read_consistency(),
            )?
            .into_iter()
            .map(|(column, stored)| Ok((entry_key(&self.property, &column)?, self.from_stored(stored)?)))
            .collect()
    }

    /// Removes an entry.
    ///
    /// # Errors
    ///
    /// Returns flush errors.
    pub fn remove(&self, key: impl Into<Value>) -> CoreResult<()> {
        let column = self.composite_factory.create_for_wide_map(&key.into());
        let row = self.context.primary_key();
        self.context
            .with_wide_row_mutator(self.dao.column_family(), |m| self.dao.remove_column(m, row, column))?;
        self.context.flush()
    }

    fn to_stored(&self, value: &Value) -> CoreResult<Value> {
        match self.property.value_kind() {
            ValueKind::Object(_) => Ok(Value::Text(self.property.encode_value(value)?)),
            _ => Ok(value.clone()),
        }
    }

    fn from_stored(&self, stored: Value) -> CoreResult<Value> {
        match (self.property.value_kind(), stored) {
            (ValueKind::Object(_), Value::Text(raw)) => self.property.decode_value(&raw),
            (_, stored) => Ok(stored),
        }
    }
}

/// A wide map of joined entities, storing their primary keys.
#[derive(Debug, Clone)]
pub struct JoinWideMap {
    context: PersistenceContext,
    property: Arc<PropertyMeta>,
    dao: Arc<WideRowDao>,
    join_loader: JoinLoader,
    composite_factory: CompositeFactory,
}

impl JoinWideMap {
    pub(crate) fn new(
        context: PersistenceContext,
        property: Arc<PropertyMeta>,
        join_loader: JoinLoader,
    ) -> CoreResult<Self> {
        let dao = wide_row_dao(&context, &property)?;
        Ok(Self {
            context,
            property,
            dao,
            join_loader,
            composite_factory: CompositeFactory::new(),
        })
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.property.name()
    }

    /// Inserts a joined entity, cascading to it as the join declares.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an entity of another class, or
    /// cascade and flush errors.
    pub fn insert(&self, key: impl Into<Value>, entity: &EntityProxy) -> CoreResult<()> {
        let key = key.into();
        EntityPersister::new().prepare_join(&self.context, &self.property, entity)?;
        let options = write_options(&self.context);
        let column = self.composite_factory.create_for_wide_map(&key);
        let row = self.context.primary_key();
        trace!(property = self.name(), %key, join_key = %entity.primary_key(), "join wide map insert");
        self.context.with_wide_row_mutator(self.dao.column_family(), |m| {
            self.dao.insert_column(m, row, column, entity.primary_key(), &options)
        })?;
        self.context.flush()
    }

    /// Reads one joined entity. Entries whose entity no longer exists read
    /// as `None`.
    ///
    /// # Errors
    ///
    /// Returns read or decode errors.
    pub fn get(&self, key: impl Into<Value>) -> CoreResult<Option<EntityProxy>> {
        let column = self.composite_factory.create_for_wide_map(&key.into());
        let Some(join_key) =
            self.dao
                .get_value(self.context.primary_key(), &column, self.context.read_consistency())?
        else {
            return Ok(None);
        };
        let (join_meta, join_dao) = JoinLoader::join_target(&self.context, &self.property)?;
        let mut loaded = self
            .join_loader
            .load(&self.context, &join_meta, &join_dao, &[join_key.clone()])?;
        Ok(loaded.remove(&join_key))
    }

    /// Reads joined entities between optional inclusive bounds, loading
    /// all of them with one join load.
    ///
    /// # Errors
    ///
    /// Returns read or decode errors.
    pub fn find(
        &self,
        start: Option<&Value>,
        end: Option<&Value>,
        limit: usize,
        reversed: bool,
    ) -> CoreResult<Vec<(Value, EntityProxy)>> {
        let (start, end) = self.composite_factory.create_wide_map_bounds(start, end);
        let entries = self
            .dao
            .find_columns_range(
                self.context.primary_key(),
                start,
                end,
                reversed,
                limit,
                self.context.read_consistency(),
            )?
            .into_iter()
            .map(|(column, join_key)| Ok((entry_key(&self.property, &column)?, join_key)))
            .collect::<CoreResult<Vec<_>>>()?;
        let keys: Vec<Value> = entries.iter().map(|(_, join_key)| join_key.clone()).collect();
        let (join_meta, join_dao) = JoinLoader::join_target(&self.context, &self.property)?;
        let loaded = self.join_loader.load(&self.context, &join_meta, &join_dao, &keys)?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, join_key)| loaded.get(&join_key).map(|p| (key, p.clone())))
            .collect())
    }

    /// Removes an entry. The joined entity is left untouched.
    ///
    /// # Errors
    ///
    /// Returns flush errors.
    pub fn remove(&self, key: impl Into<Value>) -> CoreResult<()> {
        let column = self.composite_factory.create_for_wide_map(&key.into());
        let row = self.context.primary_key();
        self.context
            .with_wide_row_mutator(self.dao.column_family(), |m| self.dao.remove_column(m, row, column))?;
        self.context.flush()
    }
}

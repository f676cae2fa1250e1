//! DAO for entity rows.

use super::{range_query, DaoCore, Mutator};
use crate::composite_factory::CompositeFactory;
use crate::consistency::ConsistencyPolicy;
use crate::error::{CoreError, CoreResult};
use crate::options::Options;
use std::sync::Arc;
use tracing::debug;
use wideorm_codec::{Composite, Serializer, Value};
use wideorm_storage::{ColumnSlice, ColumnStore, ConsistencyLevel, Mutation, SliceQuery};

/// Column values of an entity row, decoded to their stored text.
pub type EntityColumns = Vec<(Composite, String)>;

/// Reads and writes the rows of one entity column family.
///
/// Column names are composites; column values are the transcoder's text
/// form, stored as UTF-8.
#[derive(Debug, Clone)]
pub struct EntityDao {
    core: DaoCore,
    composite_factory: CompositeFactory,
}

impl EntityDao {
    const VALUE_SERIALIZER: Serializer = Serializer::String;

    /// Creates a DAO for a column family.
    #[must_use]
    pub fn new(
        column_family: impl Into<String>,
        key_serializer: Serializer,
        policy: Arc<ConsistencyPolicy>,
        store: Arc<dyn ColumnStore>,
    ) -> Self {
        let column_family = column_family.into();
        debug!(%column_family, key_serializer = key_serializer.name(), "entity dao created");
        Self {
            core: DaoCore {
                column_family,
                key_serializer,
                policy,
                store,
            },
            composite_factory: CompositeFactory::new(),
        }
    }

    /// Returns the column family.
    #[must_use]
    pub fn column_family(&self) -> &str {
        &self.core.column_family
    }

    /// Returns the row key serializer.
    #[must_use]
    pub fn key_serializer(&self) -> Serializer {
        self.core.key_serializer
    }

    /// Reads the columns between two inclusive bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be serialized, the store fails or
    /// a stored value is not UTF-8.
    pub fn find_columns_range(
        &self,
        key: &Value,
        start: &Composite,
        end: &Composite,
        reversed: bool,
        limit: usize,
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<EntityColumns> {
        let query = range_query(start.clone(), end.clone(), reversed, limit);
        let slice = self.core.slice(key, &query, consistency)?;
        Self::decode_slice(slice)
    }

    /// Reads one column value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the value is not UTF-8.
    pub fn get_value(
        &self,
        key: &Value,
        column: &Composite,
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<Option<String>> {
        self.core
            .column(key, column, consistency)?
            .map(|bytes| Self::decode_text(&bytes))
            .transpose()
    }

    /// Reads the eager columns of one row.
    ///
    /// An empty result means the row does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn eager_load_entity(
        &self,
        key: &Value,
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<EntityColumns> {
        let (start, end) = self.composite_factory.create_eager_range();
        self.find_columns_range(key, &start, &end, false, usize::MAX, consistency)
    }

    /// Reads the eager columns of many rows in one round trip.
    ///
    /// Rows that do not exist are absent from the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn eager_load_entities(
        &self,
        keys: &[Value],
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<Vec<(Value, EntityColumns)>> {
        let (start, end) = self.composite_factory.create_eager_range();
        let query = SliceQuery::range(start, end);
        self.core
            .multiget(keys, &query, consistency)?
            .into_iter()
            .map(|(key, slice)| Ok((key, Self::decode_slice(slice)?)))
            .collect()
    }

    /// Queues a column with an empty value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be serialized.
    pub fn insert_name(&self, mutator: &mut Mutator, key: &Value, column: Composite, options: &Options) -> CoreResult<()> {
        self.insert_column(mutator, key, column, "", options)
    }

    /// Queues the insertion of a column.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be serialized.
    pub fn insert_column(
        &self,
        mutator: &mut Mutator,
        key: &Value,
        column: Composite,
        value: &str,
        options: &Options,
    ) -> CoreResult<()> {
        let row = self.core.row_key(key)?;
        let value = Self::VALUE_SERIALIZER.to_bytes(&Value::text(value))?;
        mutator.add(Mutation::Insert {
            row,
            column,
            value,
            ttl: options.ttl(),
            timestamp: options.timestamp(),
        });
        Ok(())
    }

    /// Queues the removal of a column.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be serialized.
    pub fn remove_column(&self, mutator: &mut Mutator, key: &Value, column: Composite) -> CoreResult<()> {
        let row = self.core.row_key(key)?;
        mutator.add(Mutation::RemoveColumn { row, column });
        Ok(())
    }

    /// Queues the removal of every column between two inclusive bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be serialized.
    pub fn remove_column_range(
        &self,
        mutator: &mut Mutator,
        key: &Value,
        start: Composite,
        end: Composite,
    ) -> CoreResult<()> {
        let row = self.core.row_key(key)?;
        mutator.add(Mutation::RemoveRange { row, start, end });
        Ok(())
    }

    /// Queues the removal of a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be serialized.
    pub fn remove_row(&self, mutator: &mut Mutator, key: &Value) -> CoreResult<()> {
        let row = self.core.row_key(key)?;
        mutator.add(Mutation::RemoveRow { row });
        Ok(())
    }

    /// Creates an empty mutator for this column family.
    #[must_use]
    pub fn build_mutator(&self) -> Mutator {
        self.core.mutator()
    }

    fn decode_text(bytes: &[u8]) -> CoreResult<String> {
        match Self::VALUE_SERIALIZER.from_bytes(bytes)? {
            Value::Text(s) => Ok(s),
            other => Err(CoreError::invalid_state(format!(
                "string serializer produced a {}",
                other.type_name()
            ))),
        }
    }

    fn decode_slice(slice: ColumnSlice) -> CoreResult<EntityColumns> {
        slice
            .into_iter()
            .map(|(name, bytes)| Ok((name, Self::decode_text(&bytes)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wideorm_storage::InMemoryColumnStore;

    fn dao(store: &Arc<InMemoryColumnStore>) -> EntityDao {
        let policy = Arc::new(
            ConsistencyPolicy::new(ConsistencyLevel::One, ConsistencyLevel::One)
                .with_read_level("users", ConsistencyLevel::LocalQuorum),
        );
        EntityDao::new("users", Serializer::Long, policy, Arc::clone(store) as Arc<dyn ColumnStore>)
    }

    fn column(flag: i32, name: &str, tail: Value) -> Composite {
        Composite::new()
            .with(Value::Int(flag))
            .with(Value::text(name))
            .with(tail)
    }

    #[test]
    fn insert_then_eager_load() {
        let store = Arc::new(InMemoryColumnStore::new());
        let dao = dao(&store);
        let key = Value::Long(10);
        let marker = CompositeFactory::new().create_eager_marker();

        let mut mutator = dao.build_mutator();
        dao.insert_name(&mut mutator, &key, marker.clone(), &Options::default())
            .unwrap();
        dao.insert_column(&mut mutator, &key, column(1, "name", Value::text("")), "John", &Options::default())
            .unwrap();
        dao.insert_column(&mut mutator, &key, column(2, "emails", Value::Long(0)), "a@b", &Options::default())
            .unwrap();
        mutator.execute(ConsistencyLevel::One).unwrap();

        let eager = dao.eager_load_entity(&key, None).unwrap();
        assert_eq!(
            eager,
            vec![
                (marker, String::new()),
                (column(1, "name", Value::text("")), "John".to_string()),
            ]
        );
        assert_eq!(store.last_level("users"), Some(ConsistencyLevel::LocalQuorum));
    }

    #[test]
    fn override_reaches_the_store() {
        let store = Arc::new(InMemoryColumnStore::new());
        let dao = dao(&store);
        dao.eager_load_entity(&Value::Long(1), Some(ConsistencyLevel::All))
            .unwrap();
        assert_eq!(store.last_level("users"), Some(ConsistencyLevel::All));
    }

    #[test]
    fn eager_load_entities_is_one_round_trip() {
        let store = Arc::new(InMemoryColumnStore::new());
        let dao = dao(&store);
        let marker = CompositeFactory::new().create_eager_marker();
        let mut mutator = dao.build_mutator();
        for id in [1_i64, 3] {
            dao.insert_column(&mut mutator, &Value::Long(id), marker.clone(), "", &Options::default())
                .unwrap();
        }
        mutator.execute(ConsistencyLevel::One).unwrap();

        let before = store.round_trips();
        let rows = dao
            .eager_load_entities(&[Value::Long(1), Value::Long(2), Value::Long(3)], None)
            .unwrap();
        assert_eq!(store.round_trips(), before + 1);
        let keys: Vec<_> = rows.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Value::Long(1), Value::Long(3)]);
    }

    #[test]
    fn ttl_and_timestamp_are_applied() {
        let store = Arc::new(InMemoryColumnStore::new());
        let dao = dao(&store);
        let key = Value::Long(7);
        let col = column(1, "name", Value::text(""));
        let options = Options::default().with_ttl(60).with_timestamp(1_000);

        let mut mutator = dao.build_mutator();
        dao.insert_column(&mut mutator, &key, col.clone(), "x", &options).unwrap();
        mutator.execute(ConsistencyLevel::One).unwrap();

        let row = Serializer::Long.to_bytes(&key).unwrap();
        assert_eq!(store.ttl_of("users", &row, &col), Some(60));
        assert_eq!(store.timestamp_of("users", &row, &col), Some(1_000));
    }

    #[test]
    fn range_reads_and_removals() {
        let store = Arc::new(InMemoryColumnStore::new());
        let dao = dao(&store);
        let key = Value::Long(1);
        let mut mutator = dao.build_mutator();
        for i in 0..5 {
            dao.insert_column(&mut mutator, &key, column(2, "emails", Value::Long(i)), &format!("e{i}"), &Options::default())
                .unwrap();
        }
        mutator.execute(ConsistencyLevel::One).unwrap();

        let start = column(2, "emails", Value::Long(3));
        let end = column(2, "emails", Value::Long(1));
        let values: Vec<_> = dao
            .find_columns_range(&key, &start, &end, true, 10, None)
            .unwrap()
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(values, vec!["e3", "e2", "e1"]);

        let mut mutator = dao.build_mutator();
        dao.remove_column(&mut mutator, &key, column(2, "emails", Value::Long(0)))
            .unwrap();
        dao.remove_column_range(&mut mutator, &key, column(2, "emails", Value::Long(3)), column(2, "emails", Value::Long(4)))
            .unwrap();
        mutator.execute(ConsistencyLevel::One).unwrap();
        let row = Serializer::Long.to_bytes(&key).unwrap();
        assert_eq!(store.column_count("users", &row), 2);

        let mut mutator = dao.build_mutator();
        dao.remove_row(&mut mutator, &key).unwrap();
        mutator.execute(ConsistencyLevel::One).unwrap();
        assert_eq!(store.row_count("users"), 0);
    }
}

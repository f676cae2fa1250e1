//! DAO for wide rows.

use super::{range_query, DaoCore, Mutator};
use crate::consistency::ConsistencyPolicy;
use crate::error::CoreResult;
use crate::options::Options;
use std::sync::Arc;
use tracing::debug;
use wideorm_codec::{Composite, Serializer, Value};
use wideorm_storage::{ColumnStore, ConsistencyLevel, Mutation, SliceQuery};

/// Reads and writes the rows of one wide-row column family.
///
/// Values go through a typed value serializer instead of the transcoder.
#[derive(Debug, Clone)]
pub struct WideRowDao {
    core: DaoCore,
    value_serializer: Serializer,
}

impl WideRowDao {
    /// Creates a DAO for a column family.
    #[must_use]
    pub fn new(
        column_family: impl Into<String>,
        key_serializer: Serializer,
        value_serializer: Serializer,
        policy: Arc<ConsistencyPolicy>,
        store: Arc<dyn ColumnStore>,
    ) -> Self {
        let column_family = column_family.into();
        debug!(
            %column_family,
            key_serializer = key_serializer.name(),
            value_serializer = value_serializer.name(),
            "wide row dao created"
        );
        Self {
            core: DaoCore {
                column_family,
                key_serializer,
                policy,
                store,
            },
            value_serializer,
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

    /// Returns the value serializer.
    #[must_use]
    pub fn value_serializer(&self) -> Serializer {
        self.value_serializer
    }

    /// Reads columns in walk order, between optional inclusive bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or a value does not decode.
    pub fn find_columns_range(
        &self,
        key: &Value,
        start: Option<Composite>,
        end: Option<Composite>,
        reversed: bool,
        limit: usize,
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<Vec<(Composite, Value)>> {
        let query = match (start, end) {
            (Some(start), Some(end)) => range_query(start, end, reversed, limit),
            (start, end) => SliceQuery {
                start,
                end,
                reversed,
                limit,
            },
        };
        self.core
            .slice(key, &query, consistency)?
            .into_iter()
            .map(|(name, bytes)| Ok((name, self.value_serializer.from_bytes(&bytes)?)))
            .collect()
    }

    /// Reads one column value.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the value does not decode.
    pub fn get_value(
        &self,
        key: &Value,
        column: &Composite,
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<Option<Value>> {
        self.core
            .column(key, column, consistency)?
            .map(|bytes| Ok(self.value_serializer.from_bytes(&bytes)?))
            .transpose()
    }

    /// Queues the insertion of a column.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or the value cannot be serialized.
    pub fn insert_column(
        &self,
        mutator: &mut Mutator,
        key: &Value,
        column: Composite,
        value: &Value,
        options: &Options,
    ) -> CoreResult<()> {
        let row = self.core.row_key(key)?;
        let value = self.value_serializer.to_bytes(value)?;
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use wideorm_storage::InMemoryColumnStore;

    fn column(n: i64) -> Composite {
        Composite::new().with(Value::Long(n))
    }

    #[test]
    fn values_use_the_value_serializer() {
        let store = Arc::new(InMemoryColumnStore::new());
        let dao = WideRowDao::new(
            "user_tweets",
            Serializer::Long,
            Serializer::String,
            Arc::new(ConsistencyPolicy::default()),
            Arc::clone(&store) as Arc<dyn ColumnStore>,
        );
        let key = Value::Long(1);

        let mut mutator = dao.build_mutator();
        for n in 1..=4 {
            dao.insert_column(&mut mutator, &key, column(n), &Value::text(format!("t{n}")), &Options::default())
                .unwrap();
        }
        mutator.execute(ConsistencyLevel::One).unwrap();

        assert_eq!(
            dao.get_value(&key, &column(2), None).unwrap(),
            Some(Value::text("t2"))
        );
        assert_eq!(dao.get_value(&key, &column(9), None).unwrap(), None);

        let found = dao
            .find_columns_range(&key, Some(column(2)), None, false, 2, None)
            .unwrap();
        assert_eq!(
            found,
            vec![(column(2), Value::text("t2")), (column(3), Value::text("t3"))]
        );

        let reversed = dao
            .find_columns_range(&key, None, None, true, 1, None)
            .unwrap();
        assert_eq!(reversed, vec![(column(4), Value::text("t4"))]);
        assert_eq!(store.last_level("user_tweets"), Some(ConsistencyLevel::Quorum));
    }

    #[test]
    fn mismatched_value_is_a_codec_error() {
        let store = Arc::new(InMemoryColumnStore::new());
        let dao = WideRowDao::new(
            "clicks",
            Serializer::String,
            Serializer::Long,
            Arc::new(ConsistencyPolicy::default()),
            store as Arc<dyn ColumnStore>,
        );
        let mut mutator = dao.build_mutator();
        let err = dao
            .insert_column(&mut mutator, &Value::text("a"), column(1), &Value::text("x"), &Options::default())
            .unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Codec(_)));
        assert!(mutator.is_empty());
    }
}

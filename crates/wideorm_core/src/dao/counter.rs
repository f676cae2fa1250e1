//! DAO for distributed counters.

use super::{DaoCore, Mutator};
use crate::consistency::ConsistencyPolicy;
use crate::error::CoreResult;
use std::sync::Arc;
use tracing::debug;
use wideorm_codec::{Composite, Serializer, Value};
use wideorm_storage::{ColumnStore, ConsistencyLevel, Mutation};

/// Reads and increments counters in the shared counter column family.
///
/// A counter row holds every counter of one entity instance; its key is
/// `"<class>:<primary key json>"` and each column is a property name.
#[derive(Debug, Clone)]
pub struct CounterDao {
    core: DaoCore,
}

impl CounterDao {
    /// Column family reserved for counters.
    pub const COLUMN_FAMILY: &'static str = "wideorm_counter";

    /// Creates the counter DAO.
    #[must_use]
    pub fn new(policy: Arc<ConsistencyPolicy>, store: Arc<dyn ColumnStore>) -> Self {
        debug!(column_family = Self::COLUMN_FAMILY, "counter dao created");
        Self {
            core: DaoCore {
                column_family: Self::COLUMN_FAMILY.to_string(),
                key_serializer: Serializer::String,
                policy,
                store,
            },
        }
    }

    /// Returns the column family.
    #[must_use]
    pub fn column_family(&self) -> &str {
        &self.core.column_family
    }

    /// Returns the counter row key of an entity instance.
    #[must_use]
    pub fn row_key(class_name: &str, key_json: &str) -> Value {
        Value::text(format!("{class_name}:{key_json}"))
    }

    /// Reads a counter. Missing counters read as zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn get_counter(
        &self,
        row: &Value,
        column: &Composite,
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<i64> {
        let key = self.core.row_key(row)?;
        let value = self.core.store.get_counter(
            &self.core.column_family,
            &key,
            column,
            self.core.read_level(consistency),
        )?;
        Ok(value.unwrap_or(0))
    }

    /// Queues an increment.
    ///
    /// # Errors
    ///
    /// Returns an error if the row key cannot be serialized.
    pub fn increment(&self, mutator: &mut Mutator, row: &Value, column: Composite, delta: i64) -> CoreResult<()> {
        let row = self.core.row_key(row)?;
        mutator.add(Mutation::IncrementCounter { row, column, delta });
        Ok(())
    }

    /// Queues a decrement.
    ///
    /// # Errors
    ///
    /// Returns an error if the row key cannot be serialized.
    pub fn decrement(&self, mutator: &mut Mutator, row: &Value, column: Composite, delta: i64) -> CoreResult<()> {
        self.increment(mutator, row, column, delta.saturating_neg())
    }

    /// Queues the removal of every counter of an entity instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the row key cannot be serialized.
    pub fn remove_counter_row(&self, mutator: &mut Mutator, row: &Value) -> CoreResult<()> {
        let row = self.core.row_key(row)?;
        mutator.add(Mutation::RemoveRow { row });
        Ok(())
    }

    /// Creates an empty mutator for the counter column family.
    #[must_use]
    pub fn build_mutator(&self) -> Mutator {
        self.core.mutator()
    }
}

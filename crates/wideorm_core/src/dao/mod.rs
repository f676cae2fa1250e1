//! Data access objects.
//!
//! One DAO per column family. DAOs read directly from the store and queue
//! writes into a [`Mutator`] owned by the flush context.

mod counter;
mod entity;
mod mutator;
mod wide_row;

pub use counter::CounterDao;
pub use entity::{EntityColumns, EntityDao};
pub use mutator::Mutator;
pub use wide_row::WideRowDao;

use crate::consistency::{ConsistencyPolicy, OperationKind};
use crate::error::CoreResult;
use std::fmt;
use std::sync::Arc;
use wideorm_codec::{Composite, Serializer, Value};
use wideorm_storage::{ColumnSlice, ColumnStore, ConsistencyLevel, SliceQuery};

/// What every DAO shares: a column family, its row key codec, the policy
/// and the store session.
#[derive(Clone)]
struct DaoCore {
    column_family: String,
    key_serializer: Serializer,
    policy: Arc<ConsistencyPolicy>,
    store: Arc<dyn ColumnStore>,
}

impl fmt::Debug for DaoCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dao")
            .field("column_family", &self.column_family)
            .field("key_serializer", &self.key_serializer)
            .finish_non_exhaustive()
    }
}

impl DaoCore {
    fn row_key(&self, key: &Value) -> CoreResult<Vec<u8>> {
        Ok(self.key_serializer.to_bytes(key)?)
    }

    fn read_level(&self, consistency: Option<ConsistencyLevel>) -> ConsistencyLevel {
        self.policy
            .resolve(&self.column_family, OperationKind::Read, consistency)
    }

    fn slice(
        &self,
        key: &Value,
        query: &SliceQuery,
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<ColumnSlice> {
        let row = self.row_key(key)?;
        Ok(self
            .store
            .get_slice(&self.column_family, &row, query, self.read_level(consistency))?)
    }

    fn column(
        &self,
        key: &Value,
        column: &Composite,
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<Option<Vec<u8>>> {
        let row = self.row_key(key)?;
        Ok(self
            .store
            .get_column(&self.column_family, &row, column, self.read_level(consistency))?)
    }

    fn multiget(
        &self,
        keys: &[Value],
        query: &SliceQuery,
        consistency: Option<ConsistencyLevel>,
    ) -> CoreResult<Vec<(Value, ColumnSlice)>> {
        let rows = keys
            .iter()
            .map(|k| self.row_key(k))
            .collect::<CoreResult<Vec<_>>>()?;
        self.store
            .multiget_slice(&self.column_family, &rows, query, self.read_level(consistency))?
            .into_iter()
            .map(|(row, columns)| Ok((self.key_serializer.from_bytes(&row)?, columns)))
            .collect()
    }

    fn mutator(&self) -> Mutator {
        Mutator::new(self.column_family.clone(), Arc::clone(&self.store))
    }
}

fn range_query(start: Composite, end: Composite, reversed: bool, limit: usize) -> SliceQuery {
    SliceQuery::range(start, end).reversed(reversed).limit(limit)
}

//! Column store trait definition.

use crate::consistency::ConsistencyLevel;
use crate::error::StorageResult;
use crate::mutation::{Mutation, SliceQuery};
use std::fmt;
use wideorm_codec::Composite;

/// Columns of one row in walk order.
pub type ColumnSlice = Vec<(Composite, Vec<u8>)>;

/// Rows of a multiget, each with its columns.
pub type RowSlice = Vec<(Vec<u8>, ColumnSlice)>;

/// A session against a wide-column store.
///
/// Implementations are the wire-protocol drivers. Every call blocks until
/// the store answers or fails; timeouts belong to the session, not to the
/// caller.
///
/// # Invariants
///
/// - `get_slice` returns columns ascending by name, or descending when the
///   query is reversed, truncated to the query limit
/// - `multiget_slice` is a single round trip and omits rows with no columns
/// - `execute_batch` applies all of its mutations or none of them
pub trait ColumnStore: Send + Sync + fmt::Debug {
    /// Reads a slice of one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot serve the read at `level`.
    fn get_slice(
        &self,
        column_family: &str,
        row: &[u8],
        query: &SliceQuery,
        level: ConsistencyLevel,
    ) -> StorageResult<ColumnSlice>;

    /// Reads the same slice of many rows in one round trip.
    ///
    /// Rows are returned in the order requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot serve the read at `level`.
    fn multiget_slice(
        &self,
        column_family: &str,
        rows: &[Vec<u8>],
        query: &SliceQuery,
        level: ConsistencyLevel,
    ) -> StorageResult<RowSlice>;

    /// Reads a single column.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot serve the read at `level`.
    fn get_column(
        &self,
        column_family: &str,
        row: &[u8],
        column: &Composite,
        level: ConsistencyLevel,
    ) -> StorageResult<Option<Vec<u8>>> {
        let query = SliceQuery::range(column.clone(), column.clone()).limit(1);
        Ok(self
            .get_slice(column_family, row, &query, level)?
            .into_iter()
            .next()
            .map(|(_, value)| value))
    }

    /// Reads a counter column.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot serve the read at `level`.
    fn get_counter(
        &self,
        column_family: &str,
        row: &[u8],
        column: &Composite,
        level: ConsistencyLevel,
    ) -> StorageResult<Option<i64>>;

    /// Applies a batch of mutations to one column family.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch was not applied.
    fn execute_batch(
        &self,
        column_family: &str,
        mutations: &[Mutation],
        level: ConsistencyLevel,
    ) -> StorageResult<()>;
}

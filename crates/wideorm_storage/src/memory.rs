//! In-memory column store for testing.

use crate::consistency::ConsistencyLevel;
use crate::error::{StorageError, StorageResult};
use crate::mutation::{Mutation, SliceQuery};
use crate::store::{ColumnSlice, ColumnStore, RowSlice};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;
use wideorm_codec::Composite;

#[derive(Debug, Clone)]
struct Cell {
    value: Vec<u8>,
    ttl: Option<u32>,
    timestamp: Option<i64>,
}

type Row = BTreeMap<Composite, Cell>;
type CounterRow = BTreeMap<Composite, i64>;

#[derive(Debug, Default)]
struct State {
    families: HashMap<String, HashMap<Vec<u8>, Row>>,
    counters: HashMap<String, HashMap<Vec<u8>, CounterRow>>,
}

/// An in-memory column store.
///
/// Suitable for:
/// - Unit and integration tests
/// - Ephemeral stores that don't need a cluster
///
/// Column families are created on first write. TTLs and timestamps are
/// recorded but never expire anything. Every call is counted as one round
/// trip and the consistency level it carried is remembered per column
/// family, so tests can observe what the caller resolved.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
#[derive(Debug, Default)]
pub struct InMemoryColumnStore {
    state: RwLock<State>,
    failing: RwLock<HashSet<String>>,
    last_levels: RwLock<HashMap<String, ConsistencyLevel>>,
    round_trips: AtomicU64,
}

impl InMemoryColumnStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every batch against `column_family` fail until [`Self::recover`].
    pub fn fail_batches_for(&self, column_family: impl Into<String>) {
        self.failing.write().insert(column_family.into());
    }

    /// Stops failing batches against `column_family`.
    pub fn recover(&self, column_family: &str) {
        self.failing.write().remove(column_family);
    }

    /// Returns the number of calls served so far.
    #[must_use]
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Returns the consistency level of the latest call on `column_family`.
    #[must_use]
    pub fn last_level(&self, column_family: &str) -> Option<ConsistencyLevel> {
        self.last_levels.read().get(column_family).copied()
    }

    /// Returns the number of non-empty rows in a column family.
    #[must_use]
    pub fn row_count(&self, column_family: &str) -> usize {
        self.state
            .read()
            .families
            .get(column_family)
            .map_or(0, |rows| rows.values().filter(|r| !r.is_empty()).count())
    }

    /// Returns the number of columns stored in a row.
    #[must_use]
    pub fn column_count(&self, column_family: &str, row: &[u8]) -> usize {
        self.state
            .read()
            .families
            .get(column_family)
            .and_then(|rows| rows.get(row))
            .map_or(0, BTreeMap::len)
    }

    /// Returns the ttl recorded for a column, if any.
    #[must_use]
    pub fn ttl_of(&self, column_family: &str, row: &[u8], column: &Composite) -> Option<u32> {
        self.cell(column_family, row, column).and_then(|c| c.ttl)
    }

    /// Returns the timestamp recorded for a column, if any.
    #[must_use]
    pub fn timestamp_of(&self, column_family: &str, row: &[u8], column: &Composite) -> Option<i64> {
        self.cell(column_family, row, column).and_then(|c| c.timestamp)
    }

    fn cell(&self, column_family: &str, row: &[u8], column: &Composite) -> Option<Cell> {
        self.state
            .read()
            .families
            .get(column_family)
            .and_then(|rows| rows.get(row))
            .and_then(|r| r.get(column))
            .cloned()
    }

    fn observe(&self, column_family: &str, level: ConsistencyLevel) {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        self.last_levels
            .write()
            .insert(column_family.to_string(), level);
    }

    fn slice(row: &Row, query: &SliceQuery) -> ColumnSlice {
        let (low, high) = if query.reversed {
            (query.end.as_ref(), query.start.as_ref())
        } else {
            (query.start.as_ref(), query.end.as_ref())
        };
        if let (Some(l), Some(h)) = (low, high) {
            if l > h {
                return Vec::new();
            }
        }
        let bounds = (
            low.map_or(Bound::Unbounded, Bound::Included),
            high.map_or(Bound::Unbounded, Bound::Included),
        );
        let range = row.range::<Composite, _>(bounds);
        let pick = |(k, c): (&Composite, &Cell)| (k.clone(), c.value.clone());
        if query.reversed {
            range.rev().take(query.limit).map(pick).collect()
        } else {
            range.take(query.limit).map(pick).collect()
        }
    }
}

impl ColumnStore for InMemoryColumnStore {
    fn get_slice(
        &self,
        column_family: &str,
        row: &[u8],
        query: &SliceQuery,
        level: ConsistencyLevel,
    ) -> StorageResult<ColumnSlice> {
        self.observe(column_family, level);
        let state = self.state.read();
        Ok(state
            .families
            .get(column_family)
            .and_then(|rows| rows.get(row))
            .map(|r| Self::slice(r, query))
            .unwrap_or_default())
    }

    fn multiget_slice(
        &self,
        column_family: &str,
        rows: &[Vec<u8>],
        query: &SliceQuery,
        level: ConsistencyLevel,
    ) -> StorageResult<RowSlice> {
        self.observe(column_family, level);
        let state = self.state.read();
        let Some(family) = state.families.get(column_family) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter_map(|key| {
                let columns = Self::slice(family.get(key)?, query);
                (!columns.is_empty()).then(|| (key.clone(), columns))
            })
            .collect())
    }

    fn get_counter(
        &self,
        column_family: &str,
        row: &[u8],
        column: &Composite,
        level: ConsistencyLevel,
    ) -> StorageResult<Option<i64>> {
        self.observe(column_family, level);
        Ok(self
            .state
            .read()
            .counters
            .get(column_family)
            .and_then(|rows| rows.get(row))
            .and_then(|r| r.get(column))
            .copied())
    }

    fn execute_batch(
        &self,
        column_family: &str,
        mutations: &[Mutation],
        level: ConsistencyLevel,
    ) -> StorageResult<()> {
        self.observe(column_family, level);
        if self.failing.read().contains(column_family) {
            return Err(StorageError::Unavailable(format!(
                "cannot achieve {level} on {column_family}"
            )));
        }
        trace!(
            column_family,
            count = mutations.len(),
            "applying mutation batch"
        );

        let mut state = self.state.write();
        let State { families, counters } = &mut *state;
        for mutation in mutations {
            match mutation {
                Mutation::Insert {
                    row,
                    column,
                    value,
                    ttl,
                    timestamp,
                } => {
                    families
                        .entry(column_family.to_string())
                        .or_default()
                        .entry(row.clone())
                        .or_default()
                        .insert(
                            column.clone(),
                            Cell {
                                value: value.clone(),
                                ttl: *ttl,
                                timestamp: *timestamp,
                            },
                        );
                }
                Mutation::RemoveColumn { row, column } => {
                    if let Some(r) = families.get_mut(column_family).and_then(|f| f.get_mut(row)) {
                        r.remove(column);
                    }
                }
                Mutation::RemoveRange { row, start, end } => {
                    if start > end {
                        continue;
                    }
                    if let Some(r) = families.get_mut(column_family).and_then(|f| f.get_mut(row)) {
                        let doomed: Vec<Composite> =
                            r.range(start.clone()..=end.clone()).map(|(k, _)| k.clone()).collect();
                        for key in doomed {
                            r.remove(&key);
                        }
                    }
                }
                Mutation::RemoveRow { row } => {
                    if let Some(f) = families.get_mut(column_family) {
                        f.remove(row);
                    }
                    if let Some(f) = counters.get_mut(column_family) {
                        f.remove(row);
                    }
                }
                Mutation::IncrementCounter { row, column, delta } => {
                    *counters
                        .entry(column_family.to_string())
                        .or_default()
                        .entry(row.clone())
                        .or_default()
                        .entry(column.clone())
                        .or_insert(0) += delta;
                }
            }
        }
        Ok(())
    }
}

//! Wire shapes for slice queries and mutations.

use wideorm_codec::Composite;

/// Bounds of a column slice within one row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SliceQuery {
    /// Inclusive lower bound, or the start of the row.
    pub start: Option<Composite>,
    /// Inclusive upper bound, or the end of the row.
    pub end: Option<Composite>,
    /// Walk the row from the end.
    pub reversed: bool,
    /// Maximum number of columns returned.
    pub limit: usize,
}

impl SliceQuery {
    /// Selects every column of a row.
    #[must_use]
    pub fn all() -> Self {
        Self {
            start: None,
            end: None,
            reversed: false,
            limit: usize::MAX,
        }
    }

    /// Selects columns between two bounds, ascending and unbounded in count.
    #[must_use]
    pub fn range(start: Composite, end: Composite) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            reversed: false,
            limit: usize::MAX,
        }
    }

    /// Sets the walk direction.
    #[must_use]
    pub fn reversed(mut self, reversed: bool) -> Self {
        self.reversed = reversed;
        self
    }

    /// Sets the column limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Returns true if `column` lies within the bounds.
    ///
    /// Bounds are given in walk order, so a reversed query has its start
    /// above its end.
    #[must_use]
    pub fn contains(&self, column: &Composite) -> bool {
        let (low, high) = if self.reversed {
            (self.end.as_ref(), self.start.as_ref())
        } else {
            (self.start.as_ref(), self.end.as_ref())
        };
        low.map_or(true, |l| column >= l) && high.map_or(true, |h| column <= h)
    }
}

/// One pending write against a column family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert or overwrite a column.
    Insert {
        /// Row key.
        row: Vec<u8>,
        /// Column name.
        column: Composite,
        /// Column value.
        value: Vec<u8>,
        /// Time to live in seconds.
        ttl: Option<u32>,
        /// Write timestamp in microseconds.
        timestamp: Option<i64>,
    },
    /// Delete one column.
    RemoveColumn {
        /// Row key.
        row: Vec<u8>,
        /// Column name.
        column: Composite,
    },
    /// Delete every column between two inclusive bounds.
    RemoveRange {
        /// Row key.
        row: Vec<u8>,
        /// Lower bound.
        start: Composite,
        /// Upper bound.
        end: Composite,
    },
    /// Delete a whole row.
    RemoveRow {
        /// Row key.
        row: Vec<u8>,
    },
    /// Add a delta to a counter column.
    IncrementCounter {
        /// Row key.
        row: Vec<u8>,
        /// Column name.
        column: Composite,
        /// Signed delta.
        delta: i64,
    },
}

impl Mutation {
    /// Creates a plain insert without ttl or timestamp.
    #[must_use]
    pub fn insert(row: Vec<u8>, column: Composite, value: Vec<u8>) -> Self {
        Mutation::Insert {
            row,
            column,
            value,
            ttl: None,
            timestamp: None,
        }
    }

    /// Returns the row key the mutation targets.
    #[must_use]
    pub fn row(&self) -> &[u8] {
        match self {
            Mutation::Insert { row, .. }
            | Mutation::RemoveColumn { row, .. }
            | Mutation::RemoveRange { row, .. }
            | Mutation::RemoveRow { row }
            | Mutation::IncrementCounter { row, .. } => row,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wideorm_codec::{ComponentEquality, Value};

    fn col(n: i64) -> Composite {
        Composite::new().with(Value::text("p")).with(Value::Long(n))
    }

    #[test]
    fn all_contains_everything() {
        assert!(SliceQuery::all().contains(&col(5)));
    }

    #[test]
    fn range_is_inclusive() {
        let q = SliceQuery::range(col(1), col(3));
        assert!(q.contains(&col(1)));
        assert!(q.contains(&col(3)));
        assert!(!q.contains(&col(4)));
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        let q = SliceQuery::range(col(3), col(1)).reversed(true);
        assert!(q.contains(&col(2)));
        assert!(!q.contains(&col(0)));
    }

    #[test]
    fn prefix_bounds_select_property() {
        let start = Composite::new().with(Value::text("p"));
        let end = Composite::new().with_bound(Value::text("p"), ComponentEquality::GreaterThanEqual);
        let q = SliceQuery::range(start, end);
        assert!(q.contains(&col(0)));
        assert!(!q.contains(&Composite::new().with(Value::text("q"))));
    }
}

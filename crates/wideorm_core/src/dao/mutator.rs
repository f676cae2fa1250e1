//! Pending writes of one column family.

use std::fmt;
use std::sync::Arc;
use tracing::trace;
use wideorm_storage::{ColumnStore, ConsistencyLevel, Mutation, StorageResult};

/// Ordered pending mutations for one column family.
///
/// Owned by a flush context; DAOs only append to it.
pub struct Mutator {
    column_family: String,
    store: Arc<dyn ColumnStore>,
    mutations: Vec<Mutation>,
}

impl fmt::Debug for Mutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("column_family", &self.column_family)
            .field("pending", &self.mutations.len())
            .finish()
    }
}

impl Mutator {
    pub(crate) fn new(column_family: String, store: Arc<dyn ColumnStore>) -> Self {
        Self {
            column_family,
            store,
            mutations: Vec::new(),
        }
    }

    /// Returns the column family.
    #[must_use]
    pub fn column_family(&self) -> &str {
        &self.column_family
    }

    /// Appends a mutation.
    pub fn add(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    /// Returns the pending mutations in submission order.
    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Returns the number of pending mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Submits pending mutations as one batch, then clears them.
    ///
    /// # Errors
    ///
    /// Returns the store error; pending mutations are kept on failure.
    pub fn execute(&mut self, level: ConsistencyLevel) -> StorageResult<()> {
        if self.mutations.is_empty() {
            return Ok(());
        }
        trace!(
            column_family = %self.column_family,
            count = self.mutations.len(),
            %level,
            "executing batch"
        );
        self.store
            .execute_batch(&self.column_family, &self.mutations, level)?;
        self.mutations.clear();
        Ok(())
    }

    /// Moves the mutations of `other` behind the pending ones.
    pub(crate) fn append(&mut self, other: &mut Mutator) {
        self.mutations.append(&mut other.mutations);
    }

    /// Drops pending mutations.
    pub fn discard(&mut self) {
        self.mutations.clear();
    }
}

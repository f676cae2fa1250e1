//! Pending writes of one unit of work.

use crate::config::FlushStrategy;
use crate::consistency::{ConsistencyPolicy, OperationKind};
use crate::context::DaoContext;
use crate::dao::{CounterDao, Mutator};
use crate::error::{CoreError, CoreResult};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};
use wideorm_storage::ConsistencyLevel;

/// A flush context shared by a tree of persistence contexts.
///
/// Every context spawned from a parent holds the same `Rc`, so all of
/// their writes land in one set of mutators. Not `Send`: a tree lives on
/// one thread.
pub type SharedFlushContext = Rc<RefCell<FlushContext>>;

/// Lifecycle of a flush context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    /// Accepting mutations.
    Open,
    /// Submitting batches.
    Flushing,
    /// Committed or discarded batch; accepts nothing.
    Closed,
}

/// Accumulates mutators per column family and submits them.
///
/// With [`FlushStrategy::Immediate`] every `flush` submits and the context
/// returns to `Open`. With [`FlushStrategy::Batch`] `flush` only marks a
/// boundary; `commit` submits everything and closes the context.
///
/// Batches are submitted entity tables first, then wide rows, then
/// counters, each group in column family order. A failing batch stops the
/// flush: earlier batches stay applied, later ones are dropped unsent and
/// the error is [`CoreError::PartialFlush`] naming both.
#[derive(Debug)]
pub struct FlushContext {
    strategy: FlushStrategy,
    state: FlushState,
    dao_context: Arc<DaoContext>,
    policy: Arc<ConsistencyPolicy>,
    consistency: Option<ConsistencyLevel>,
    entity_mutators: BTreeMap<String, Mutator>,
    wide_row_mutators: BTreeMap<String, Mutator>,
    counter_mutator: Option<Mutator>,
}

impl FlushContext {
    /// Creates an open context.
    #[must_use]
    pub fn new(
        strategy: FlushStrategy,
        dao_context: Arc<DaoContext>,
        policy: Arc<ConsistencyPolicy>,
    ) -> Self {
        Self {
            strategy,
            state: FlushState::Open,
            dao_context,
            policy,
            consistency: None,
            entity_mutators: BTreeMap::new(),
            wide_row_mutators: BTreeMap::new(),
            counter_mutator: None,
        }
    }

    /// Wraps the context for sharing within one context tree.
    #[must_use]
    pub fn into_shared(self) -> SharedFlushContext {
        Rc::new(RefCell::new(self))
    }

    /// Returns the strategy.
    #[must_use]
    pub const fn strategy(&self) -> FlushStrategy {
        self.strategy
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> FlushState {
        self.state
    }

    /// Returns the write consistency override.
    #[must_use]
    pub const fn consistency_level(&self) -> Option<ConsistencyLevel> {
        self.consistency
    }

    /// Sets the write consistency override for the next submissions.
    pub fn set_consistency_level(&mut self, level: Option<ConsistencyLevel>) {
        self.consistency = level;
    }

    /// Returns the number of pending mutations across all column families.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entity_mutators
            .values()
            .chain(self.wide_row_mutators.values())
            .chain(self.counter_mutator.iter())
            .map(Mutator::len)
            .sum()
    }

    /// Returns the mutator of an entity table, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error unless `Open`, or a configuration
    /// error if no DAO serves the column family.
    pub fn get_entity_mutator(&mut self, column_family: &str) -> CoreResult<&mut Mutator> {
        self.ensure_open()?;
        if !self.entity_mutators.contains_key(column_family) {
            let dao = self.dao_context.find_entity_dao(column_family).ok_or_else(|| {
                CoreError::configuration(format!("no entity dao for column family {column_family}"))
            })?;
            self.entity_mutators
                .insert(column_family.to_string(), dao.build_mutator());
        }
        self.entity_mutators
            .get_mut(column_family)
            .ok_or_else(|| CoreError::invalid_state("entity mutator vanished"))
    }

    /// Returns the mutator of a wide row, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error unless `Open`, or a configuration
    /// error if no DAO serves the column family.
    pub fn get_wide_row_mutator(&mut self, column_family: &str) -> CoreResult<&mut Mutator> {
        self.ensure_open()?;
        if !self.wide_row_mutators.contains_key(column_family) {
            let dao = self.dao_context.find_wide_row_dao(column_family).ok_or_else(|| {
                CoreError::configuration(format!("no wide row dao for column family {column_family}"))
            })?;
            self.wide_row_mutators
                .insert(column_family.to_string(), dao.build_mutator());
        }
        self.wide_row_mutators
            .get_mut(column_family)
            .ok_or_else(|| CoreError::invalid_state("wide row mutator vanished"))
    }

    /// Returns the counter mutator, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error unless `Open`, or a configuration
    /// error if no entity has counters.
    pub fn get_counter_mutator(&mut self) -> CoreResult<&mut Mutator> {
        self.ensure_open()?;
        if self.counter_mutator.is_none() {
            let dao = self.dao_context.get_counter_dao().ok_or_else(|| {
                CoreError::configuration("no counter dao; no entity declares a counter")
            })?;
            self.counter_mutator = Some(dao.build_mutator());
        }
        self.counter_mutator
            .as_mut()
            .ok_or_else(|| CoreError::invalid_state("counter mutator vanished"))
    }

    /// Marks the end of an operation.
    ///
    /// Submits pending batches in immediate mode; does nothing in batch
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PartialFlush`] if a batch fails, or an invalid
    /// state error if the context is closed.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        match self.strategy {
            FlushStrategy::Immediate => self.submit(FlushState::Open),
            FlushStrategy::Batch => Ok(()),
        }
    }

    /// Submits every pending batch.
    ///
    /// A batch context is closed afterwards, success or not.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PartialFlush`] if a batch fails, or an invalid
    /// state error if the context is closed.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        let after = match self.strategy {
            FlushStrategy::Immediate => FlushState::Open,
            FlushStrategy::Batch => FlushState::Closed,
        };
        self.submit(after)
    }

    /// Moves every mutation staged in `staged` behind the pending ones.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error unless `Open`, or a configuration
    /// error if no DAO serves a staged column family.
    pub fn absorb(&mut self, staged: &mut FlushContext) -> CoreResult<()> {
        self.ensure_open()?;
        for (column_family, mut mutator) in std::mem::take(&mut staged.entity_mutators) {
            self.get_entity_mutator(&column_family)?.append(&mut mutator);
        }
        for (column_family, mut mutator) in std::mem::take(&mut staged.wide_row_mutators) {
            self.get_wide_row_mutator(&column_family)?.append(&mut mutator);
        }
        if let Some(mut mutator) = staged.counter_mutator.take() {
            self.get_counter_mutator()?.append(&mut mutator);
        }
        Ok(())
    }

    /// Drops every pending mutation. A batch context is closed afterwards.
    pub fn discard(&mut self) {
        let pending = self.pending_count();
        if pending > 0 {
            debug!(pending, "discarding pending mutations");
        }
        self.clear();
        if self.strategy == FlushStrategy::Batch {
            self.state = FlushState::Closed;
        }
    }

    /// Closes the context.
    pub fn close(&mut self) {
        self.clear();
        self.state = FlushState::Closed;
    }

    /// Returns a fresh open context with the same strategy, DAOs and
    /// consistency override, and nothing pending.
    #[must_use]
    pub fn duplicate_without_pending_state(&self) -> Self {
        let mut duplicate = Self::new(
            self.strategy,
            Arc::clone(&self.dao_context),
            Arc::clone(&self.policy),
        );
        duplicate.consistency = self.consistency;
        duplicate
    }

    fn ensure_open(&self) -> CoreResult<()> {
        match self.state {
            FlushState::Open => Ok(()),
            FlushState::Flushing => Err(CoreError::invalid_state("flush context is flushing")),
            FlushState::Closed => Err(CoreError::invalid_state("flush context is closed")),
        }
    }

    fn clear(&mut self) {
        self.entity_mutators.clear();
        self.wide_row_mutators.clear();
        self.counter_mutator = None;
    }

    fn submit(&mut self, after: FlushState) -> CoreResult<()> {
        self.state = FlushState::Flushing;
        let entity = std::mem::take(&mut self.entity_mutators);
        let wide = std::mem::take(&mut self.wide_row_mutators);
        let counter = self
            .counter_mutator
            .take()
            .map(|m| (CounterDao::COLUMN_FAMILY.to_string(), m));

        let mut pending = entity
            .into_iter()
            .chain(wide)
            .chain(counter)
            .filter(|(_, mutator)| !mutator.is_empty());
        let mut flushed = Vec::new();
        while let Some((column_family, mut mutator)) = pending.next() {
            let level = self
                .policy
                .resolve(&column_family, OperationKind::Write, self.consistency);
            if let Err(source) = mutator.execute(level) {
                let skipped: Vec<String> = pending.map(|(cf, _)| cf).collect();
                warn!(
                    %column_family,
                    already_flushed = ?flushed,
                    ?skipped,
                    error = %source,
                    "flush failed"
                );
                self.state = after;
                return Err(CoreError::PartialFlush {
                    column_family,
                    flushed,
                    skipped,
                    source,
                });
            }
            flushed.push(column_family);
        }
        if !flushed.is_empty() {
            debug!(column_families = ?flushed, "flushed");
        }
        self.state = after;
        Ok(())
    }
}

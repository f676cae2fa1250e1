//! Writing back changed properties.

use super::EntityPersister;
use crate::context::PersistenceContext;
use crate::error::CoreResult;
use crate::metadata::PropertyMeta;
use crate::proxy::EntityInterceptor;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// Rewrites the dirty properties of a managed entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityMerger {
    persister: EntityPersister,
}

impl EntityMerger {
    /// Creates a merger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            persister: EntityPersister::new(),
        }
    }

    /// Queues, for every dirty property, the removal of its stored columns
    /// followed by its current value. Leaves the dirty map empty.
    ///
    /// Writes are staged apart and join the pending ones only once every
    /// dirty property was written, so a failure queues nothing.
    ///
    /// # Errors
    ///
    /// Returns the persister's error, with the dirty map restored.
    pub fn merge(&self, interceptor: &mut EntityInterceptor) -> CoreResult<()> {
        let dirty = interceptor.take_dirty();
        if dirty.is_empty() {
            trace!(key = %interceptor.key(), "nothing to merge");
            return Ok(());
        }
        let context = interceptor.context().clone();
        debug!(
            class_name = context.entity_meta().class_name(),
            key = %context.primary_key(),
            properties = dirty.len(),
            "merging"
        );
        let staged = context
            .flush_context()
            .borrow()
            .duplicate_without_pending_state()
            .into_shared();
        let staging = context.clone().with_flush_context(Rc::clone(&staged));
        let result = self
            .stage(&staging, interceptor, &dirty)
            .and_then(|()| context.flush_context().borrow_mut().absorb(&mut staged.borrow_mut()));
        if let Err(error) = &result {
            debug!(key = %context.primary_key(), %error, "merge failed, nothing queued");
            interceptor.restore_dirty(dirty);
        }
        result
    }

    fn stage(
        &self,
        staging: &PersistenceContext,
        interceptor: &EntityInterceptor,
        dirty: &[Arc<PropertyMeta>],
    ) -> CoreResult<()> {
        for pm in dirty {
            self.persister.remove_property(staging, pm)?;
            if let Some(value) = interceptor.target().get(pm.name()) {
                self.persister.persist_property(staging, pm, &value)?;
            }
        }
        Ok(())
    }
}

//! Writing and removing entities.

use crate::composite_factory::CompositeFactory;
use crate::context::PersistenceContext;
use crate::entity::{Entity, PropertyValue};
use crate::error::{CoreError, CoreResult};
use crate::metadata::{PropertyMeta, PropertyType};
use crate::proxy::EntityProxy;
use std::sync::Arc;
use tracing::{debug, trace};
use wideorm_codec::{Composite, Value};

/// Queues the mutations that store or delete an entity.
///
/// Nothing is written to the store here; the caller flushes the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityPersister {
    composite_factory: CompositeFactory,
}

impl EntityPersister {
    /// Creates a persister.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            composite_factory: CompositeFactory::new(),
        }
    }

    /// Queues every non-null property of `entity` plus the row marker.
    ///
    /// Wide-row entities have no row of their own and write nothing.
    ///
    /// # Errors
    ///
    /// Returns encoding errors, a validation error if a property holds the
    /// wrong shape, or cascade errors.
    pub fn persist(&self, context: &PersistenceContext, entity: &dyn Entity) -> CoreResult<()> {
        let meta = Arc::clone(context.entity_meta());
        if meta.is_wide_row() {
            trace!(class_name = meta.class_name(), "wide row entity has no row to persist");
            return Ok(());
        }
        debug!(class_name = meta.class_name(), key = %context.primary_key(), "persisting");
        let dao = Arc::clone(context.require_entity_dao()?);
        let options = *context.options();
        context.with_entity_mutator(dao.column_family(), |m| {
            dao.insert_name(m, context.primary_key(), self.composite_factory.create_eager_marker(), &options)
        })?;
        for pm in meta.properties() {
            if let Some(value) = entity.get(pm.name()) {
                self.persist_property(context, pm, &value)?;
            }
        }
        Ok(())
    }

    /// Queues the columns of one property.
    ///
    /// Null values write nothing. Counters are incremented by their value.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `value` does not have the shape of
    /// the property type.
    pub fn persist_property(
        &self,
        context: &PersistenceContext,
        pm: &PropertyMeta,
        value: &PropertyValue,
    ) -> CoreResult<()> {
        if value.is_null() {
            return Ok(());
        }
        let factory = &self.composite_factory;
        match (pm.property_type(), value) {
            (PropertyType::Simple, PropertyValue::Value(v)) => {
                self.insert(context, factory.create_for_simple(pm), &pm.encode_value(v)?)
            }
            (PropertyType::List, PropertyValue::Value(Value::List(items))) => {
                for (index, item) in items.iter().enumerate() {
                    self.insert(context, factory.create_for_list(pm, index), &pm.encode_value(item)?)?;
                }
                Ok(())
            }
            (PropertyType::Set, PropertyValue::Value(Value::Set(items))) => {
                for item in items {
                    self.insert(context, factory.create_for_set(pm, &pm.encode_value(item)?), "")?;
                }
                Ok(())
            }
            (PropertyType::Map, PropertyValue::Value(Value::Map(entries))) => {
                for (key, item) in entries {
                    let column = factory.create_for_map(pm, &pm.encode_key(key)?);
                    self.insert(context, column, &pm.encode_value(item)?)?;
                }
                Ok(())
            }
            (PropertyType::JoinSimple, PropertyValue::Join(proxy)) => {
                let join_key = self.prepare_join(context, pm, proxy)?;
                self.insert(context, factory.create_for_join_simple(pm), &join_key)
            }
            (PropertyType::JoinList, PropertyValue::JoinList(items)) => {
                for (index, proxy) in items.iter().enumerate() {
                    let join_key = self.prepare_join(context, pm, proxy)?;
                    self.insert(context, factory.create_for_list(pm, index), &join_key)?;
                }
                Ok(())
            }
            (PropertyType::JoinSet, PropertyValue::JoinSet(items) | PropertyValue::JoinList(items)) => {
                for proxy in items {
                    let join_key = self.prepare_join(context, pm, proxy)?;
                    self.insert(context, factory.create_for_set(pm, &join_key), "")?;
                }
                Ok(())
            }
            (PropertyType::JoinMap, PropertyValue::JoinMap(entries)) => {
                for (key, proxy) in entries {
                    let join_key = self.prepare_join(context, pm, proxy)?;
                    let column = factory.create_for_map(pm, &pm.encode_key(key)?);
                    self.insert(context, column, &join_key)?;
                }
                Ok(())
            }
            (PropertyType::Counter, PropertyValue::Value(v)) => {
                let delta = v.as_long().ok_or_else(|| {
                    CoreError::validation(format!("counter {} holds a {}", pm.name(), v.type_name()))
                })?;
                if delta == 0 {
                    return Ok(());
                }
                let dao = context.get_counter_dao()?;
                let row = context.counter_row_key()?;
                let column = factory.create_counter_column(pm);
                context.with_counter_mutator(|m| dao.increment(m, &row, column, delta))
            }
            (PropertyType::WideMap, PropertyValue::WideMap(_))
            | (PropertyType::JoinWideMap, PropertyValue::JoinWideMap(_)) => Ok(()),
            (ty, other) => Err(CoreError::validation(format!(
                "property {} of type {ty} cannot hold a {}",
                pm.name(),
                other.kind_name()
            ))),
        }
    }

    /// Cascades to a joined entity and returns its encoded key.
    ///
    /// With a persist cascade the joined entity is written in full; with a
    /// merge cascade only its dirty properties are. A proxy already being
    /// written higher up the same call is not cascaded to again.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the proxy is of another class than
    /// the join target, or the cascade error.
    pub fn prepare_join(
        &self,
        context: &PersistenceContext,
        pm: &PropertyMeta,
        proxy: &EntityProxy,
    ) -> CoreResult<String> {
        let join_meta = pm.join_entity_meta()?;
        if proxy.class_name() != join_meta.class_name() {
            return Err(CoreError::validation(format!(
                "property {} joins {} but was given a {}",
                pm.name(),
                join_meta.class_name(),
                proxy.class_name()
            )));
        }
        let cascade = pm
            .join_properties()
            .map(|join| join.cascade())
            .unwrap_or_default();
        if cascade.cascades_persist() || cascade.cascades_merge() {
            match proxy.interceptor_mut() {
                Ok(mut interceptor) => {
                    let child = context
                        .new_persistence_context_for_key(Arc::clone(&join_meta), proxy.primary_key().clone())?;
                    trace!(
                        property = pm.name(),
                        join_class = join_meta.class_name(),
                        key = %proxy.primary_key(),
                        ?cascade,
                        "cascading"
                    );
                    if cascade.cascades_persist() {
                        self.persist(&child, interceptor.target())?;
                        interceptor.take_dirty();
                    } else {
                        for dirty in interceptor.take_dirty() {
                            self.remove_property(&child, &dirty)?;
                            if let Some(value) = interceptor.target().get(dirty.name()) {
                                self.persist_property(&child, &dirty, &value)?;
                            }
                        }
                    }
                }
                Err(_) => trace!(key = %proxy.primary_key(), "join already being written"),
            }
        }
        join_meta.require_id_meta()?.encode_value(proxy.primary_key())
    }

    /// Queues the removal of every stored column of one property.
    ///
    /// Counters and wide maps are not stored in the entity row and are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be serialized.
    pub fn remove_property(&self, context: &PersistenceContext, pm: &PropertyMeta) -> CoreResult<()> {
        if !pm.property_type().is_entity_row_column() {
            return Ok(());
        }
        let dao = Arc::clone(context.require_entity_dao()?);
        let (start, end) = self.composite_factory.create_property_range(pm);
        let key = context.primary_key();
        context.with_entity_mutator(dao.column_family(), |m| dao.remove_column_range(m, key, start, end))
    }

    /// Queues the removal of an entity: its row, the rows of the wide maps
    /// it owns and its counters.
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be serialized or a DAO is missing.
    pub fn remove(&self, context: &PersistenceContext) -> CoreResult<()> {
        let meta = Arc::clone(context.entity_meta());
        let key = context.primary_key();
        debug!(class_name = meta.class_name(), %key, "removing");
        if let Some(dao) = context.entity_dao().cloned() {
            context.with_entity_mutator(dao.column_family(), |m| dao.remove_row(m, key))?;
        }
        for pm in meta.properties().filter(|pm| pm.property_type().is_wide_map()) {
            let Some(column_family) = pm.external_column_family() else {
                continue;
            };
            let dao = context.find_wide_row_dao(column_family).ok_or_else(|| {
                CoreError::configuration(format!("no wide row dao for {column_family}"))
            })?;
            context.with_wide_row_mutator(column_family, |m| dao.remove_row(m, key))?;
        }
        if meta.has_counter() {
            let dao = context.get_counter_dao()?;
            let row = context.counter_row_key()?;
            context.with_counter_mutator(|m| dao.remove_counter_row(m, &row))?;
        }
        Ok(())
    }

    fn insert(&self, context: &PersistenceContext, column: Composite, value: &str) -> CoreResult<()> {
        let dao = Arc::clone(context.require_entity_dao()?);
        let key = context.primary_key();
        let options = *context.options();
        context.with_entity_mutator(dao.column_family(), |m| {
            dao.insert_column(m, key, column, value, &options)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlushStrategy;
    use crate::options::Options;
    use crate::testing::{Stack, User};
    use std::collections::{BTreeMap, BTreeSet};
    use wideorm_codec::Serializer;

    fn persist(stack: &Stack, user: &User, options: Options) {
        let ctx = stack
            .context_for_entity(user, FlushStrategy::Immediate)
            .unwrap()
            .with_options(options);
        EntityPersister::new().persist(&ctx, user).unwrap();
        ctx.flush().unwrap();
    }

    fn row(id: i64) -> Vec<u8> {
        Serializer::Long.to_bytes(&Value::Long(id)).unwrap()
    }

    #[test]
    fn persist_writes_marker_and_every_set_property() {
        let stack = Stack::new();
        let mut user = User::with_id(1);
        user.name = Some("alice".into());
        user.age = Some(30);
        user.emails = vec!["a@x".into(), "b@x".into()];
        user.tags = BTreeSet::from(["rust".to_string()]);
        user.preferences = BTreeMap::from([(1, "en".to_string())]);
        persist(&stack, &user, Options::default());

        // marker, name, age, two emails, one tag, one preference
        assert_eq!(stack.store.column_count("users", &row(1)), 7);
        let ctx = stack.context_for_key("User", Value::Long(1), FlushStrategy::Immediate).unwrap();
        let name = ctx.entity_meta().property("name").unwrap();
        let stored = ctx
            .require_entity_dao()
            .unwrap()
            .get_value(&Value::Long(1), &CompositeFactory::new().create_for_simple(name), None)
            .unwrap();
        assert_eq!(stored.as_deref(), Some("alice"));
    }

    #[test]
    fn ttl_and_timestamp_reach_every_column() {
        let stack = Stack::new();
        let mut user = User::with_id(2);
        user.name = Some("bob".into());
        persist(&stack, &user, Options::default().with_ttl(60).with_timestamp(1234));

        let marker = CompositeFactory::new().create_eager_marker();
        assert_eq!(stack.store.ttl_of("users", &row(2), &marker), Some(60));
        assert_eq!(stack.store.timestamp_of("users", &row(2), &marker), Some(1234));
    }

    #[test]
    fn counters_are_incremented_by_their_initial_value() {
        let stack = Stack::new();
        let mut user = User::with_id(3);
        user.visits = Some(5);
        persist(&stack, &user, Options::default());

        let ctx = stack.context_for_key("User", Value::Long(3), FlushStrategy::Immediate).unwrap();
        let visits = ctx.entity_meta().property("visits").unwrap();
        let count = ctx
            .get_counter_dao()
            .unwrap()
            .get_counter(
                &ctx.counter_row_key().unwrap(),
                &CompositeFactory::new().create_counter_column(visits),
                None,
            )
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn join_stores_the_key_without_cascade() {
        let stack = Stack::new();
        let friend = stack.manage(User::with_id(20));
        let mut user = User::with_id(4);
        user.friends = vec![friend];
        persist(&stack, &user, Options::default());

        assert_eq!(stack.store.row_count("users"), 1);
        let ctx = stack.context_for_key("User", Value::Long(4), FlushStrategy::Immediate).unwrap();
        let friends = ctx.entity_meta().property("friends").unwrap();
        let column = CompositeFactory::new().create_for_list(friends, 0);
        let stored = ctx
            .require_entity_dao()
            .unwrap()
            .get_value(&Value::Long(4), &column, None)
            .unwrap();
        assert_eq!(stored.as_deref(), Some("20"));
    }

    #[test]
    fn persist_cascade_writes_the_joined_entity() {
        let stack = Stack::new();
        let mut target = User::with_id(21);
        target.name = Some("carol".into());
        let best = stack.manage(target);
        let mut user = User::with_id(5);
        user.best_friend = Some(best);
        persist(&stack, &user, Options::default());

        assert_eq!(stack.store.row_count("users"), 2);
    }

    #[test]
    fn joins_of_another_class_are_rejected() {
        let stack = Stack::new();
        let click = stack.manage_click_log("home");
        let ctx = stack.context_for_key("User", Value::Long(6), FlushStrategy::Immediate).unwrap();
        let pm = Arc::clone(ctx.entity_meta().property("best_friend").unwrap());
        let err = EntityPersister::new()
            .persist_property(&ctx, &pm, &PropertyValue::Join(click))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn wrong_shape_is_a_validation_error() {
        let stack = Stack::new();
        let ctx = stack.context_for_key("User", Value::Long(6), FlushStrategy::Immediate).unwrap();
        let pm = Arc::clone(ctx.entity_meta().property("emails").unwrap());
        let err = EntityPersister::new()
            .persist_property(&ctx, &pm, &PropertyValue::Value(Value::text("a@x")))
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn remove_property_clears_only_that_property() {
        let stack = Stack::new();
        let mut user = User::with_id(7);
        user.name = Some("dave".into());
        user.emails = vec!["a@x".into(), "b@x".into()];
        persist(&stack, &user, Options::default());

        let ctx = stack.context_for_key("User", Value::Long(7), FlushStrategy::Immediate).unwrap();
        let emails = Arc::clone(ctx.entity_meta().property("emails").unwrap());
        EntityPersister::new().remove_property(&ctx, &emails).unwrap();
        ctx.flush().unwrap();

        assert_eq!(stack.store.column_count("users", &row(7)), 2);
    }

    #[test]
    fn remove_deletes_row_wide_maps_and_counters() {
        let stack = Stack::new();
        let mut user = User::with_id(8);
        user.name = Some("erin".into());
        user.visits = Some(2);
        persist(&stack, &user, Options::default());
        let ctx = stack.context_for_key("User", Value::Long(8), FlushStrategy::Batch).unwrap();

        EntityPersister::new().remove(&ctx).unwrap();

        let flush = ctx.flush_context().borrow();
        // users row, user_tweets row, user_timeline row, counter row
        assert_eq!(flush.pending_count(), 4);
    }
}

//! Reassembly of join properties.

use super::{discriminator, property_columns, JoinEntityLoader};
use crate::composite_factory::CompositeFactory;
use crate::context::PersistenceContext;
use crate::dao::EntityDao;
use crate::error::{CoreError, CoreResult};
use crate::metadata::{EntityMeta, PropertyMeta};
use crate::proxy::EntityProxy;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use wideorm_codec::Value;

/// Loads join properties: reads the stored join keys of a property, hands
/// all of them to the [`JoinEntityLoader`] in a single call and reassembles
/// the result in the property's shape.
///
/// Keys the loader did not return (rows deleted since) are skipped.
#[derive(Debug, Clone)]
pub struct JoinLoader {
    composite_factory: CompositeFactory,
    join_entity_loader: Arc<dyn JoinEntityLoader>,
}

impl JoinLoader {
    /// Creates a join loader.
    #[must_use]
    pub fn new(join_entity_loader: Arc<dyn JoinEntityLoader>) -> Self {
        Self {
            composite_factory: CompositeFactory::new(),
            join_entity_loader,
        }
    }

    /// Returns the join entity loader.
    #[must_use]
    pub fn join_entity_loader(&self) -> &Arc<dyn JoinEntityLoader> {
        &self.join_entity_loader
    }

    /// Loads a single joined entity.
    ///
    /// # Errors
    ///
    /// Returns read, decode or configuration errors.
    pub fn load_join_simple_property(
        &self,
        context: &PersistenceContext,
        pm: &PropertyMeta,
    ) -> CoreResult<Option<EntityProxy>> {
        let dao = context.require_entity_dao()?;
        let column = self.composite_factory.create_for_join_simple(pm);
        let Some(raw) = dao.get_value(context.primary_key(), &column, context.read_consistency())? else {
            return Ok(None);
        };
        let (join_meta, join_dao) = Self::join_target(context, pm)?;
        let key = Self::decode_join_key(&join_meta, &raw)?;
        let mut loaded = self.load(context, &join_meta, &join_dao, &[key.clone()])?;
        Ok(loaded.remove(&key))
    }

    /// Loads joined entities in list order.
    ///
    /// # Errors
    ///
    /// Returns read, decode or configuration errors.
    pub fn load_join_list_property(
        &self,
        context: &PersistenceContext,
        pm: &PropertyMeta,
    ) -> CoreResult<Vec<EntityProxy>> {
        let (join_meta, join_dao) = Self::join_target(context, pm)?;
        let keys = property_columns(&self.composite_factory, context, pm)?
            .iter()
            .map(|(_, raw)| Self::decode_join_key(&join_meta, raw))
            .collect::<CoreResult<Vec<_>>>()?;
        let loaded = self.load(context, &join_meta, &join_dao, &keys)?;
        Ok(keys.iter().filter_map(|k| loaded.get(k).cloned()).collect())
    }

    /// Loads joined entities without duplicates.
    ///
    /// # Errors
    ///
    /// Returns read, decode or configuration errors.
    pub fn load_join_set_property(
        &self,
        context: &PersistenceContext,
        pm: &PropertyMeta,
    ) -> CoreResult<Vec<EntityProxy>> {
        let (join_meta, join_dao) = Self::join_target(context, pm)?;
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for (column, _) in property_columns(&self.composite_factory, context, pm)? {
            let key = Self::decode_join_key(&join_meta, discriminator(pm, &column)?)?;
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        let loaded = self.load(context, &join_meta, &join_dao, &keys)?;
        Ok(keys.iter().filter_map(|k| loaded.get(k).cloned()).collect())
    }

    /// Loads joined entities by map key, in key order.
    ///
    /// # Errors
    ///
    /// Returns read, decode or configuration errors.
    pub fn load_join_map_property(
        &self,
        context: &PersistenceContext,
        pm: &PropertyMeta,
    ) -> CoreResult<Vec<(Value, EntityProxy)>> {
        let (join_meta, join_dao) = Self::join_target(context, pm)?;
        let mut entries = BTreeMap::new();
        for (column, raw) in property_columns(&self.composite_factory, context, pm)? {
            let map_key = pm.decode_key(discriminator(pm, &column)?)?;
            entries.insert(map_key, Self::decode_join_key(&join_meta, &raw)?);
        }
        let keys: Vec<Value> = entries.values().cloned().collect();
        let loaded = self.load(context, &join_meta, &join_dao, &keys)?;
        Ok(entries
            .into_iter()
            .filter_map(|(map_key, join_key)| loaded.get(&join_key).map(|p| (map_key, p.clone())))
            .collect())
    }

    /// Loads entities for already decoded join keys in one call.
    ///
    /// # Errors
    ///
    /// Returns the loader's error.
    pub fn load(
        &self,
        context: &PersistenceContext,
        join_meta: &Arc<EntityMeta>,
        join_dao: &EntityDao,
        keys: &[Value],
    ) -> CoreResult<HashMap<Value, EntityProxy>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        self.join_entity_loader
            .load_join_entities(context, join_meta, keys, join_dao, &self.join_entity_loader)
    }

    /// Resolves the joined metadata and its DAO.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if either is missing.
    pub fn join_target(
        context: &PersistenceContext,
        pm: &PropertyMeta,
    ) -> CoreResult<(Arc<EntityMeta>, Arc<EntityDao>)> {
        let join_meta = pm.join_entity_meta()?;
        let join_dao = context
            .find_entity_dao(join_meta.table_name())
            .ok_or_else(|| {
                CoreError::configuration(format!(
                    "no entity dao for join table {} of {}",
                    join_meta.table_name(),
                    pm.name()
                ))
            })?;
        Ok((join_meta, join_dao))
    }

    fn decode_join_key(join_meta: &EntityMeta, raw: &str) -> CoreResult<Value> {
        join_meta.require_id_meta()?.decode_value(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlushStrategy;
    use crate::testing::{RecordingJoinEntityLoader, Stack};

    fn setup() -> (Stack, PersistenceContext, Arc<RecordingJoinEntityLoader>) {
        let stack = Stack::new();
        stack.store_user(11, "user1");
        stack.store_user(12, "user2");
        let ctx = stack
            .context_for_key("User", Value::Long(10), FlushStrategy::Immediate)
            .unwrap();
        (stack, ctx, Arc::new(RecordingJoinEntityLoader::default()))
    }

    fn names(proxies: &[EntityProxy]) -> Vec<Value> {
        proxies
            .iter()
            .map(|p| p.get_value("name").unwrap().unwrap())
            .collect()
    }

    #[test]
    fn join_list_loads_all_keys_in_one_call() {
        let (stack, ctx, recorder) = setup();
        stack.store_columns(10, "friends", |f, pm| {
            vec![(f.create_for_list(pm, 0), "11".into()), (f.create_for_list(pm, 1), "12".into())]
        });
        let loader = JoinLoader::new(Arc::clone(&recorder) as Arc<dyn JoinEntityLoader>);
        let pm = ctx.entity_meta().property("friends").unwrap();

        let friends = loader.load_join_list_property(&ctx, pm).unwrap();

        assert_eq!(names(&friends), vec![Value::text("user1"), Value::text("user2")]);
        assert_eq!(recorder.calls(), vec![vec![Value::Long(11), Value::Long(12)]]);
    }

    #[test]
    fn join_set_reads_keys_from_column_names() {
        let (stack, ctx, recorder) = setup();
        stack.store_columns(10, "followers", |f, pm| {
            vec![(f.create_for_set(pm, "11"), String::new()), (f.create_for_set(pm, "12"), String::new())]
        });
        let loader = JoinLoader::new(Arc::clone(&recorder) as Arc<dyn JoinEntityLoader>);
        let pm = ctx.entity_meta().property("followers").unwrap();

        let followers = loader.load_join_set_property(&ctx, pm).unwrap();

        assert_eq!(followers.len(), 2);
        assert_eq!(recorder.calls(), vec![vec![Value::Long(11), Value::Long(12)]]);
    }

    #[test]
    fn join_map_is_keyed_by_decoded_map_key() {
        let (stack, ctx, recorder) = setup();
        stack.store_columns(10, "favorites", |f, pm| {
            vec![(f.create_for_map(pm, "1"), "11".into()), (f.create_for_map(pm, "2"), "12".into())]
        });
        let loader = JoinLoader::new(Arc::clone(&recorder) as Arc<dyn JoinEntityLoader>);
        let pm = ctx.entity_meta().property("favorites").unwrap();

        let favorites = loader.load_join_map_property(&ctx, pm).unwrap();

        let keys: Vec<_> = favorites.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(favorites[0].1.primary_key(), &Value::Long(11));
        assert_eq!(favorites[1].1.primary_key(), &Value::Long(12));
        assert_eq!(recorder.calls(), vec![vec![Value::Long(11), Value::Long(12)]]);
    }

    #[test]
    fn join_map_pairs_survive_unordered_columns() {
        let (stack, ctx, recorder) = setup();
        stack.store_columns(10, "favorites", |f, pm| {
            vec![(f.create_for_map(pm, "9"), "12".into()), (f.create_for_map(pm, "10"), "11".into())]
        });
        let loader = JoinLoader::new(Arc::clone(&recorder) as Arc<dyn JoinEntityLoader>);
        let pm = ctx.entity_meta().property("favorites").unwrap();

        let favorites = loader.load_join_map_property(&ctx, pm).unwrap();

        let pairs: Vec<_> = favorites
            .iter()
            .map(|(k, p)| (k.clone(), p.primary_key().clone()))
            .collect();
        assert_eq!(
            pairs,
            vec![(Value::Int(9), Value::Long(12)), (Value::Int(10), Value::Long(11))]
        );
        assert_eq!(names(&[favorites[0].1.clone()]), vec![Value::text("user2")]);
        assert_eq!(recorder.calls(), vec![vec![Value::Long(12), Value::Long(11)]]);
    }

    #[test]
    fn join_set_never_repeats_a_key() {
        let (stack, ctx, recorder) = setup();
        stack.store_columns(10, "followers", |f, pm| {
            vec![
                (f.create_for_set(pm, "12"), String::new()),
                (f.create_for_set(pm, "11"), String::new()),
                (f.create_for_set(pm, " 11"), String::new()),
            ]
        });
        let loader = JoinLoader::new(Arc::clone(&recorder) as Arc<dyn JoinEntityLoader>);
        let pm = ctx.entity_meta().property("followers").unwrap();

        let followers = loader.load_join_set_property(&ctx, pm).unwrap();

        let keys: Vec<_> = followers.iter().map(|p| p.primary_key().clone()).collect();
        assert_eq!(keys, vec![Value::Long(11), Value::Long(12)]);
        assert_eq!(recorder.calls(), vec![vec![Value::Long(11), Value::Long(12)]]);
    }

    #[test]
    fn missing_join_rows_are_skipped() {
        let (stack, ctx, recorder) = setup();
        stack.store_columns(10, "friends", |f, pm| {
            vec![
                (f.create_for_list(pm, 0), "11".into()),
                (f.create_for_list(pm, 1), "99".into()),
                (f.create_for_list(pm, 2), "12".into()),
            ]
        });
        let loader = JoinLoader::new(Arc::clone(&recorder) as Arc<dyn JoinEntityLoader>);
        let pm = ctx.entity_meta().property("friends").unwrap();

        let friends = loader.load_join_list_property(&ctx, pm).unwrap();

        assert_eq!(names(&friends), vec![Value::text("user1"), Value::text("user2")]);
    }

    #[test]
    fn join_simple_and_empty_properties() {
        let (stack, ctx, recorder) = setup();
        stack.store_columns(10, "best_friend", |f, pm| {
            vec![(f.create_for_join_simple(pm), "12".into())]
        });
        let loader = JoinLoader::new(Arc::clone(&recorder) as Arc<dyn JoinEntityLoader>);
        let meta = Arc::clone(ctx.entity_meta());

        let best = loader
            .load_join_simple_property(&ctx, meta.property("best_friend").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(best.primary_key(), &Value::Long(12));

        let friends = loader
            .load_join_list_property(&ctx, meta.property("friends").unwrap())
            .unwrap();
        assert!(friends.is_empty());
        assert_eq!(recorder.calls().len(), 1);
    }

    #[test]
    fn nested_joins_use_the_installed_loader() {
        let (stack, ctx, recorder) = setup();
        stack.store_columns(10, "friends", |f, pm| vec![(f.create_for_list(pm, 0), "11".into())]);
        stack.store_columns(11, "friends", |f, pm| vec![(f.create_for_list(pm, 0), "12".into())]);
        let loader = JoinLoader::new(Arc::clone(&recorder) as Arc<dyn JoinEntityLoader>);
        let pm = ctx.entity_meta().property("friends").unwrap();

        let friends = loader.load_join_list_property(&ctx, pm).unwrap();
        let nested = friends[0].get("friends").unwrap().unwrap();

        assert_eq!(names(nested.as_join_list().unwrap()), vec![Value::text("user2")]);
        assert_eq!(recorder.calls(), vec![vec![Value::Long(11)], vec![Value::Long(12)]]);
    }

    #[test]
    fn joined_entities_share_the_parent_flush_context() {
        let (stack, ctx, recorder) = setup();
        stack.store_columns(10, "friends", |f, pm| vec![(f.create_for_list(pm, 0), "11".into())]);
        let loader = JoinLoader::new(recorder as Arc<dyn JoinEntityLoader>);
        let pm = ctx.entity_meta().property("friends").unwrap();

        let friends = loader.load_join_list_property(&ctx, pm).unwrap();
        let child = friends[0].interceptor().unwrap();
        assert!(std::rc::Rc::ptr_eq(child.context().flush_context(), ctx.flush_context()));
    }
}

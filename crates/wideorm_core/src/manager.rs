//! Entry points: the entity manager and its factory.

use crate::config::{Config, ConfigurationContext, FlushStrategy};
use crate::context::{DaoContext, DaoContextBuilder, FlushContext, PersistenceContext, SharedFlushContext};
use crate::entity::{Entity, PropertyValue};
use crate::error::{CoreError, CoreResult};
use crate::metadata::{EntityMeta, EntityMetaRegistry};
use crate::operations::{BatchJoinEntityLoader, EntityLoader, EntityMerger, EntityPersister, JoinEntityLoader};
use crate::options::Options;
use crate::proxy::{EntityInterceptorBuilder, EntityProxy};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info};
use wideorm_codec::Value;
use wideorm_storage::{ColumnStore, ConsistencyLevel};

/// Shared, thread-safe setup of a persistence unit.
///
/// Holds the linked metadata, the configuration and the DAO registry.
/// Entity managers are cheap and single-threaded; create one per thread or
/// per request.
#[derive(Debug, Clone)]
pub struct EntityManagerFactory {
    registry: Arc<EntityMetaRegistry>,
    config: Arc<ConfigurationContext>,
    dao_context: Arc<DaoContext>,
    join_entity_loader: Arc<dyn JoinEntityLoader>,
}

impl EntityManagerFactory {
    /// Validates the metadata and builds the DAO registry over `store`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the metadata is inconsistent or a
    /// table cannot be served.
    pub fn new(
        config: Config,
        store: Arc<dyn ColumnStore>,
        metas: impl IntoIterator<Item = EntityMeta>,
    ) -> CoreResult<Self> {
        let registry = EntityMetaRegistry::new(metas)?;
        let config = ConfigurationContext::new(config);
        let dao_context = DaoContextBuilder::new().build(&store, &registry, &config, registry.has_counter())?;
        info!(
            entities = registry.len(),
            flush_strategy = ?config.flush_strategy(),
            "entity manager factory ready"
        );
        Ok(Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
            dao_context: Arc::new(dao_context),
            join_entity_loader: Arc::new(BatchJoinEntityLoader::new()),
        })
    }

    /// Replaces the loader used to materialize joined entities.
    #[must_use]
    pub fn with_join_entity_loader(mut self, loader: Arc<dyn JoinEntityLoader>) -> Self {
        self.join_entity_loader = loader;
        self
    }

    /// Returns the entity metadata.
    #[must_use]
    pub fn registry(&self) -> &Arc<EntityMetaRegistry> {
        &self.registry
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Arc<ConfigurationContext> {
        &self.config
    }

    /// Returns the DAO registry.
    #[must_use]
    pub fn dao_context(&self) -> &Arc<DaoContext> {
        &self.dao_context
    }

    /// Creates an entity manager using the configured flush strategy.
    #[must_use]
    pub fn create_entity_manager(&self) -> EntityManager {
        let strategy = self.config.flush_strategy();
        let manager = EntityManager {
            factory: self.clone(),
            flush_context: RefCell::new(Rc::new(RefCell::new(FlushContext::new(
                strategy,
                Arc::clone(&self.dao_context),
                Arc::clone(self.config.consistency_policy()),
            )))),
            batching: Cell::new(strategy == FlushStrategy::Batch),
            persister: EntityPersister::new(),
            merger: EntityMerger::new(),
        };
        debug!(?strategy, "entity manager created");
        manager
    }
}

/// Persists, loads and removes entities.
///
/// With [`FlushStrategy::Immediate`] every call is one unit of work whose
/// writes reach the store before it returns. Between
/// [`EntityManager::start_batch`] and [`EntityManager::end_batch`] all
/// calls, and every proxy they return, write into one batch that reaches
/// the store on commit.
///
/// ```
/// use std::sync::Arc;
/// use wideorm_core::{Config, EntityManagerFactory};
/// use wideorm_storage::InMemoryColumnStore;
///
/// let factory = EntityManagerFactory::new(Config::new(), Arc::new(InMemoryColumnStore::new()), []).unwrap();
/// let manager = factory.create_entity_manager();
/// assert!(!manager.is_batching());
/// ```
#[derive(Debug)]
pub struct EntityManager {
    factory: EntityManagerFactory,
    flush_context: RefCell<SharedFlushContext>,
    batching: Cell<bool>,
    persister: EntityPersister,
    merger: EntityMerger,
}

impl EntityManager {
    /// Stores a new entity and returns its managed proxy.
    ///
    /// # Errors
    ///
    /// Returns validation, encoding or flush errors.
    pub fn persist(&self, entity: Box<dyn Entity>) -> CoreResult<EntityProxy> {
        self.persist_with_options(entity, Options::default())
    }

    /// Stores a new entity with a ttl, timestamp or consistency level.
    ///
    /// # Errors
    ///
    /// Returns validation, encoding or flush errors.
    pub fn persist_with_options(&self, entity: Box<dyn Entity>, options: Options) -> CoreResult<EntityProxy> {
        let context = self.context_for_entity(entity.as_ref(), options)?;
        debug!(
            class_name = context.entity_meta().class_name(),
            key = %context.primary_key(),
            %options,
            "persist"
        );
        self.unit_of_work(&context, || self.persister.persist(&context, entity.as_ref()))?;
        self.proxy_for_new(context, entity)
    }

    /// Writes back the changed properties of a managed entity.
    ///
    /// # Errors
    ///
    /// Returns encoding or flush errors, or an invalid state error if the
    /// proxy is in use.
    pub fn merge(&self, proxy: &EntityProxy) -> CoreResult<()> {
        self.merge_with_options(proxy, Options::default())
    }

    /// Writes back changed properties with a ttl, timestamp or consistency
    /// level.
    ///
    /// # Errors
    ///
    /// See [`Self::merge`].
    pub fn merge_with_options(&self, proxy: &EntityProxy, options: Options) -> CoreResult<()> {
        let mut interceptor = proxy.interceptor_mut()?;
        interceptor.rebind(self.current_flush_context(), options);
        let context = interceptor.context().clone();
        debug!(class_name = proxy.class_name(), key = %proxy.primary_key(), "merge");
        self.unit_of_work(&context, || self.merger.merge(&mut interceptor))
    }

    /// Stores an entity that is not managed yet and returns its proxy.
    ///
    /// # Errors
    ///
    /// See [`Self::persist`].
    pub fn merge_entity(&self, entity: Box<dyn Entity>) -> CoreResult<EntityProxy> {
        self.persist(entity)
    }

    /// Wraps an entity in a proxy without writing anything.
    ///
    /// Used to join a new entity from another one; a persist cascade on
    /// the join then stores it.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the entity class is unknown or the
    /// entity has no primary key.
    pub fn manage(&self, entity: Box<dyn Entity>) -> CoreResult<EntityProxy> {
        let context = self.context_for_entity(entity.as_ref(), Options::default())?;
        self.proxy_for_new(context, entity)
    }

    /// Loads an entity by primary key.
    ///
    /// # Errors
    ///
    /// Returns read or decode errors, or a configuration error for an
    /// unknown class.
    pub fn find(&self, class_name: &str, key: impl Into<Value>) -> CoreResult<Option<EntityProxy>> {
        self.find_with_options(class_name, key, Options::default())
    }

    /// Loads an entity by primary key at a given consistency level.
    ///
    /// # Errors
    ///
    /// See [`Self::find`].
    pub fn find_with_options(
        &self,
        class_name: &str,
        key: impl Into<Value>,
        options: Options,
    ) -> CoreResult<Option<EntityProxy>> {
        let context = self.context_for_key(class_name, key.into(), options)?;
        debug!(class_name, key = %context.primary_key(), "find");
        let Some(entity) = self.loader().load(&context)? else {
            return Ok(None);
        };
        EntityInterceptorBuilder::builder(context, entity)
            .eager_loaded()
            .join_entity_loader(Arc::clone(&self.factory.join_entity_loader))
            .build_proxy()
            .map(Some)
    }

    /// Returns a proxy for a primary key without reading the store.
    ///
    /// Properties load on first access. An entity that does not exist
    /// reads as empty.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown class.
    pub fn get_reference(&self, class_name: &str, key: impl Into<Value>) -> CoreResult<EntityProxy> {
        let context = self.context_for_key(class_name, key.into(), Options::default())?;
        let meta = Arc::clone(context.entity_meta());
        let mut entity = meta.instantiate();
        entity.set(
            meta.require_id_meta()?.name(),
            PropertyValue::Value(context.primary_key().clone()),
        )?;
        EntityInterceptorBuilder::builder(context, entity)
            .join_entity_loader(Arc::clone(&self.factory.join_entity_loader))
            .build_proxy()
    }

    /// Deletes an entity with its wide maps and counters.
    ///
    /// # Errors
    ///
    /// Returns flush errors, or an invalid state error if the proxy is in
    /// use.
    pub fn remove(&self, proxy: &EntityProxy) -> CoreResult<()> {
        self.remove_with_options(proxy, Options::default())
    }

    /// Deletes an entity at a given consistency level.
    ///
    /// # Errors
    ///
    /// See [`Self::remove`].
    pub fn remove_with_options(&self, proxy: &EntityProxy, options: Options) -> CoreResult<()> {
        let mut interceptor = proxy.interceptor_mut()?;
        interceptor.rebind(self.current_flush_context(), options);
        let context = interceptor.context().clone();
        debug!(class_name = proxy.class_name(), key = %proxy.primary_key(), "remove");
        self.unit_of_work(&context, || self.persister.remove(&context))
    }

    /// Reloads a managed entity from the store, dropping unsaved changes
    /// and loaded lazy properties.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] if the entity was removed, or
    /// read and decode errors.
    pub fn refresh(&self, proxy: &EntityProxy) -> CoreResult<()> {
        self.refresh_with_options(proxy, Options::default())
    }

    /// Reloads a managed entity at a given consistency level.
    ///
    /// # Errors
    ///
    /// See [`Self::refresh`].
    pub fn refresh_with_options(&self, proxy: &EntityProxy, options: Options) -> CoreResult<()> {
        let mut interceptor = proxy.interceptor_mut()?;
        interceptor.rebind(self.current_flush_context(), options);
        let entity = self
            .loader()
            .load(interceptor.context())?
            .ok_or_else(|| CoreError::EntityNotFound {
                class_name: proxy.class_name().to_string(),
                key: proxy.primary_key().to_string(),
            })?;
        debug!(class_name = proxy.class_name(), key = %proxy.primary_key(), "refresh");
        interceptor.replace_target(entity);
        let meta = Arc::clone(proxy.entity_meta());
        interceptor.mark_loaded(meta.eager_properties().map(|pm| pm.name()));
        Ok(())
    }

    /// Starts a batch: writes of every following call are held until
    /// [`Self::end_batch`].
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if a batch is already open.
    pub fn start_batch(&self) -> CoreResult<()> {
        self.start_batch_with_consistency(None)
    }

    /// Starts a batch committed at `level` unless a call overrides it.
    ///
    /// # Errors
    ///
    /// See [`Self::start_batch`].
    pub fn start_batch_with_consistency(&self, level: Option<ConsistencyLevel>) -> CoreResult<()> {
        if self.batching.get() {
            return Err(CoreError::invalid_state("a batch is already started"));
        }
        let mut batch = self.new_flush_context(FlushStrategy::Batch);
        batch.set_consistency_level(level);
        *self.flush_context.borrow_mut() = batch.into_shared();
        self.batching.set(true);
        debug!(?level, "batch started");
        Ok(())
    }

    /// Commits the open batch.
    ///
    /// The manager returns to its configured strategy whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::PartialFlush`] if a batch of mutations fails,
    /// or an invalid state error if no batch is open.
    pub fn end_batch(&self) -> CoreResult<()> {
        let batch = self.take_batch()?;
        let pending = batch.borrow().pending_count();
        let result = batch.borrow_mut().commit();
        debug!(pending, ok = result.is_ok(), "batch ended");
        result
    }

    /// Drops the open batch without writing anything.
    ///
    /// # Errors
    ///
    /// Returns an invalid state error if no batch is open.
    pub fn clean_batch(&self) -> CoreResult<()> {
        let batch = self.take_batch()?;
        batch.borrow_mut().discard();
        debug!("batch cleaned");
        Ok(())
    }

    /// Returns true while a batch is open.
    #[must_use]
    pub fn is_batching(&self) -> bool {
        self.batching.get()
    }

    /// Returns the number of mutations waiting in the current context.
    #[must_use]
    pub fn pending_mutations(&self) -> usize {
        self.flush_context.borrow().borrow().pending_count()
    }

    /// Returns the factory this manager was created from.
    #[must_use]
    pub fn factory(&self) -> &EntityManagerFactory {
        &self.factory
    }

    fn take_batch(&self) -> CoreResult<SharedFlushContext> {
        if !self.batching.get() {
            return Err(CoreError::invalid_state("no batch is started"));
        }
        let strategy = self.factory.config.flush_strategy();
        let fresh = self.new_flush_context(strategy).into_shared();
        self.batching.set(strategy == FlushStrategy::Batch);
        Ok(self.flush_context.replace(fresh))
    }

    fn new_flush_context(&self, strategy: FlushStrategy) -> FlushContext {
        FlushContext::new(
            strategy,
            Arc::clone(&self.factory.dao_context),
            Arc::clone(self.factory.config.consistency_policy()),
        )
    }

    fn current_flush_context(&self) -> SharedFlushContext {
        Rc::clone(&self.flush_context.borrow())
    }

    fn loader(&self) -> EntityLoader {
        EntityLoader::new(Arc::clone(&self.factory.join_entity_loader))
    }

    fn context_for_entity(&self, entity: &dyn Entity, options: Options) -> CoreResult<PersistenceContext> {
        let meta = self.meta(entity.class_name())?;
        Ok(PersistenceContext::for_entity(
            meta,
            Arc::clone(&self.factory.config),
            Arc::clone(&self.factory.dao_context),
            self.current_flush_context(),
            entity,
        )?
        .with_options(options))
    }

    fn context_for_key(&self, class_name: &str, key: Value, options: Options) -> CoreResult<PersistenceContext> {
        let meta = self.meta(class_name)?;
        Ok(PersistenceContext::for_key(
            meta,
            Arc::clone(&self.factory.config),
            Arc::clone(&self.factory.dao_context),
            self.current_flush_context(),
            key,
        )?
        .with_options(options))
    }

    fn meta(&self, class_name: &str) -> CoreResult<Arc<EntityMeta>> {
        self.factory.registry.require(class_name).map(Arc::clone)
    }

    fn proxy_for_new(&self, context: PersistenceContext, entity: Box<dyn Entity>) -> CoreResult<EntityProxy> {
        let meta = Arc::clone(context.entity_meta());
        let present: Vec<String> = meta
            .properties()
            .filter(|pm| entity.get(pm.name()).is_some())
            .map(|pm| pm.name().to_string())
            .collect();
        EntityInterceptorBuilder::builder(context, entity)
            .eager_loaded()
            .lazy_loaded(present)
            .join_entity_loader(Arc::clone(&self.factory.join_entity_loader))
            .build_proxy()
    }

    /// Runs `op` then flushes. Pending writes of a failed immediate call
    /// are dropped.
    fn unit_of_work<R>(&self, context: &PersistenceContext, op: impl FnOnce() -> CoreResult<R>) -> CoreResult<R> {
        let result = op().and_then(|value| context.flush().map(|()| value));
        if result.is_err() {
            let mut flush = context.flush_context().borrow_mut();
            if flush.strategy() == FlushStrategy::Immediate {
                flush.discard();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, User};
    use wideorm_storage::InMemoryColumnStore;

    fn setup(config: Config) -> (Arc<InMemoryColumnStore>, EntityManager) {
        let store = Arc::new(InMemoryColumnStore::new());
        let factory = EntityManagerFactory::new(
            config,
            Arc::clone(&store) as Arc<dyn ColumnStore>,
            [testing::user_meta(), testing::click_log_meta()],
        )
        .unwrap();
        (store, factory.create_entity_manager())
    }

    fn alice(id: i64) -> Box<dyn Entity> {
        let mut user = User::with_id(id);
        user.name = Some("alice".into());
        user.emails = vec!["a@x".into()];
        Box::new(user)
    }

    #[test]
    fn persist_then_find() {
        let (_, manager) = setup(Config::new());
        manager.persist(alice(1)).unwrap();

        let found = manager.find("User", 1_i64).unwrap().unwrap();
        assert_eq!(found.get_value("name").unwrap(), Some(Value::text("alice")));
        assert!(!found.is_loaded("emails").unwrap());
        assert_eq!(
            found.get_value("emails").unwrap(),
            Some(Value::List(vec![Value::text("a@x")]))
        );
        assert!(found.is_loaded("emails").unwrap());
        assert!(manager.find("User", 2_i64).unwrap().is_none());
    }

    #[test]
    fn unknown_class_is_a_configuration_error() {
        let (_, manager) = setup(Config::new());
        let err = manager.find("Order", 1_i64).unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn merge_writes_only_changes() {
        let (_, manager) = setup(Config::new());
        let proxy = manager.persist(alice(1)).unwrap();
        proxy.set("age", Value::Int(33)).unwrap();
        manager.merge(&proxy).unwrap();

        let found = manager.find("User", 1_i64).unwrap().unwrap();
        assert_eq!(found.get_value("age").unwrap(), Some(Value::Int(33)));
        assert_eq!(found.get_value("name").unwrap(), Some(Value::text("alice")));
    }

    #[test]
    fn get_reference_does_not_read_until_accessed() {
        let (store, manager) = setup(Config::new());
        manager.persist(alice(1)).unwrap();
        let before = store.round_trips();

        let reference = manager.get_reference("User", 1_i64).unwrap();
        assert_eq!(store.round_trips(), before);
        assert_eq!(reference.get_value("name").unwrap(), Some(Value::text("alice")));
        assert_eq!(store.round_trips(), before + 1);
    }

    #[test]
    fn remove_then_refresh_reports_not_found() {
        let (_, manager) = setup(Config::new());
        let proxy = manager.persist(alice(1)).unwrap();
        manager.remove(&proxy).unwrap();
        assert!(manager.find("User", 1_i64).unwrap().is_none());
        let err = manager.refresh(&proxy).unwrap_err();
        assert!(matches!(err, CoreError::EntityNotFound { .. }));
    }

    #[test]
    fn refresh_drops_unsaved_changes() {
        let (_, manager) = setup(Config::new());
        let proxy = manager.persist(alice(1)).unwrap();
        proxy.set("name", Value::text("mallory")).unwrap();
        manager.refresh(&proxy).unwrap();
        assert_eq!(proxy.get_value("name").unwrap(), Some(Value::text("alice")));
        assert!(proxy.dirty_properties().unwrap().is_empty());
    }

    #[test]
    fn batch_defers_writes_until_end() {
        let (store, manager) = setup(Config::new());
        manager.start_batch().unwrap();
        manager.persist(alice(1)).unwrap();
        manager.persist(alice(2)).unwrap();
        assert_eq!(store.row_count("users"), 0);
        assert!(manager.pending_mutations() > 0);

        manager.end_batch().unwrap();
        assert_eq!(store.row_count("users"), 2);
        assert!(!manager.is_batching());
        assert_eq!(manager.pending_mutations(), 0);
    }

    #[test]
    fn clean_batch_writes_nothing() {
        let (store, manager) = setup(Config::new());
        manager.start_batch().unwrap();
        manager.persist(alice(1)).unwrap();
        manager.clean_batch().unwrap();
        assert_eq!(store.row_count("users"), 0);
        manager.persist(alice(2)).unwrap();
        assert_eq!(store.row_count("users"), 1);
    }

    #[test]
    fn batch_calls_are_checked() {
        let (_, manager) = setup(Config::new());
        assert!(matches!(manager.end_batch(), Err(CoreError::InvalidState { .. })));
        manager.start_batch().unwrap();
        assert!(matches!(manager.start_batch(), Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn proxies_of_a_closed_batch_merge_through_the_current_context() {
        let (_, manager) = setup(Config::new());
        manager.start_batch().unwrap();
        let proxy = manager.persist(alice(1)).unwrap();
        manager.end_batch().unwrap();

        proxy.set("name", Value::text("alicia")).unwrap();
        manager.merge(&proxy).unwrap();
        let found = manager.find("User", 1_i64).unwrap().unwrap();
        assert_eq!(found.get_value("name").unwrap(), Some(Value::text("alicia")));
    }

    #[test]
    fn failed_merge_in_a_batch_queues_nothing() {
        let (_, manager) = setup(Config::new());
        let bob = manager.persist(alice(2)).unwrap();
        let mut user = User::with_id(1);
        user.name = Some("alice".into());
        user.friends = vec![bob];
        manager.persist(Box::new(user)).unwrap();

        manager.start_batch().unwrap();
        let found = manager.find("User", 1_i64).unwrap().unwrap();
        let log = manager
            .manage(Box::new(testing::ClickLog { page: "home".into() }))
            .unwrap();
        found.set("friends", PropertyValue::JoinList(vec![log])).unwrap();
        found.set("name", Value::text("alicia")).unwrap();
        let err = manager.merge(&found).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert_eq!(manager.pending_mutations(), 0);
        assert_eq!(found.dirty_properties().unwrap(), vec!["friends", "name"]);
        manager.end_batch().unwrap();

        let stored = manager.find("User", 1_i64).unwrap().unwrap();
        assert_eq!(stored.get_value("name").unwrap(), Some(Value::text("alice")));
        let friends = stored.get("friends").unwrap().unwrap();
        let friends = friends.as_join_list().unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].primary_key(), &Value::Long(2));
    }

    #[test]
    fn batch_strategy_from_config_starts_batching() {
        let (store, manager) = setup(Config::new().flush_strategy(FlushStrategy::Batch));
        assert!(manager.is_batching());
        manager.persist(alice(1)).unwrap();
        assert_eq!(store.row_count("users"), 0);
        manager.end_batch().unwrap();
        assert_eq!(store.row_count("users"), 1);
        assert!(manager.is_batching());
    }

    #[test]
    fn failed_immediate_call_leaves_nothing_pending() {
        let (store, manager) = setup(Config::new());
        store.fail_batches_for("users");
        let err = manager.persist(alice(1)).unwrap_err();
        assert!(matches!(err, CoreError::PartialFlush { ref column_family, .. } if column_family == "users"));
        assert_eq!(manager.pending_mutations(), 0);
        store.recover("users");
        manager.persist(alice(1)).unwrap();
        assert_eq!(store.row_count("users"), 1);
    }

    #[test]
    fn call_consistency_reaches_the_store() {
        let (store, manager) = setup(Config::new());
        manager
            .persist_with_options(alice(1), Options::default().with_consistency(ConsistencyLevel::All))
            .unwrap();
        assert_eq!(store.last_level("users"), Some(ConsistencyLevel::All));
        manager
            .find_with_options("User", 1_i64, Options::default().with_consistency(ConsistencyLevel::One))
            .unwrap();
        assert_eq!(store.last_level("users"), Some(ConsistencyLevel::One));
        manager.persist(alice(2)).unwrap();
        assert_eq!(store.last_level("users"), Some(ConsistencyLevel::Quorum));
    }

    #[test]
    fn counters_and_wide_maps_through_proxies() {
        let (_, manager) = setup(Config::new());
        let proxy = manager.persist(alice(1)).unwrap();
        proxy.increment_counter("visits", 2).unwrap();
        proxy.increment_counter("visits", 3).unwrap();
        assert_eq!(proxy.get_value("visits").unwrap(), Some(Value::Long(5)));

        let tweets = proxy.get("tweets").unwrap().unwrap().into_wide_map().unwrap();
        tweets.insert(1_i64, "first").unwrap();
        let found = manager.find("User", 1_i64).unwrap().unwrap();
        let tweets = found.get("tweets").unwrap().unwrap().into_wide_map().unwrap();
        assert_eq!(tweets.get(1_i64).unwrap(), Some(Value::text("first")));
    }

    #[test]
    fn cascade_persists_managed_joins() {
        let (store, manager) = setup(Config::new());
        let mut bob = User::with_id(2);
        bob.name = Some("bob".into());
        let bob = manager.manage(Box::new(bob)).unwrap();
        let mut user = User::with_id(1);
        user.best_friend = Some(bob);
        manager.persist(Box::new(user)).unwrap();

        assert_eq!(store.row_count("users"), 2);
        let found = manager.find("User", 1_i64).unwrap().unwrap();
        let best = found.get("best_friend").unwrap().unwrap();
        let best = best.as_join().unwrap();
        assert_eq!(best.get_value("name").unwrap(), Some(Value::text("bob")));
    }
}

//! Fixtures shared by the unit tests.

use crate::composite_factory::CompositeFactory;
use crate::config::{Config, ConfigurationContext, FlushStrategy};
use crate::context::{DaoContext, DaoContextBuilder, FlushContext, PersistenceContext, SharedFlushContext};
use crate::dao::EntityDao;
use crate::entity::{Entity, PropertyValue};
use crate::error::{CoreError, CoreResult};
use crate::metadata::{CascadeType, EntityMeta, EntityMetaRegistry, PropertyMeta, PropertyType};
use crate::operations::{BatchJoinEntityLoader, EntityLoader, EntityPersister, JoinEntityLoader};
use crate::options::Options;
use crate::proxy::{EntityInterceptorBuilder, EntityProxy};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use wideorm_codec::{Composite, Value, ValueKind};
use wideorm_storage::{ColumnStore, InMemoryColumnStore};

/// A user with one property of every type.
#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub emails: Vec<String>,
    pub tags: BTreeSet<String>,
    pub preferences: BTreeMap<i32, String>,
    pub best_friend: Option<EntityProxy>,
    pub friends: Vec<EntityProxy>,
    pub followers: Vec<EntityProxy>,
    pub favorites: Vec<(Value, EntityProxy)>,
    pub visits: Option<i64>,
}

impl User {
    pub fn with_id(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

fn shape(property: &str, value: &PropertyValue) -> CoreError {
    CoreError::validation(format!("{property} cannot hold a {}", value.kind_name()))
}

fn text(property: &str, value: PropertyValue) -> CoreResult<Option<String>> {
    match value.try_into_value(property)? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(shape(property, &PropertyValue::Value(other))),
    }
}

impl Entity for User {
    fn class_name(&self) -> &'static str {
        "User"
    }

    fn get(&self, property: &str) -> Option<PropertyValue> {
        let value = match property {
            "id" => Value::Long(self.id),
            "name" => Value::text(self.name.clone()?),
            "age" => Value::Int(self.age?),
            "emails" if !self.emails.is_empty() => {
                Value::List(self.emails.iter().map(Value::text).collect())
            }
            "tags" if !self.tags.is_empty() => Value::Set(self.tags.iter().map(Value::text).collect()),
            "preferences" if !self.preferences.is_empty() => Value::Map(
                self.preferences
                    .iter()
                    .map(|(k, v)| (Value::Int(*k), Value::text(v)))
                    .collect(),
            ),
            "best_friend" => return self.best_friend.clone().map(PropertyValue::Join),
            "friends" if !self.friends.is_empty() => return Some(PropertyValue::JoinList(self.friends.clone())),
            "followers" if !self.followers.is_empty() => {
                return Some(PropertyValue::JoinSet(self.followers.clone()))
            }
            "favorites" if !self.favorites.is_empty() => {
                return Some(PropertyValue::JoinMap(self.favorites.clone()))
            }
            "visits" => Value::Long(self.visits?),
            _ => return None,
        };
        Some(PropertyValue::Value(value))
    }

    fn set(&mut self, property: &str, value: PropertyValue) -> CoreResult<()> {
        match property {
            "id" => match value.try_into_value(property)? {
                Value::Long(n) => self.id = n,
                other => return Err(shape(property, &PropertyValue::Value(other))),
            },
            "name" => self.name = text(property, value)?,
            "age" => match value.try_into_value(property)? {
                Value::Null => self.age = None,
                Value::Int(n) => self.age = Some(n),
                other => return Err(shape(property, &PropertyValue::Value(other))),
            },
            "emails" => match value.try_into_value(property)? {
                Value::Null => self.emails.clear(),
                Value::List(items) => {
                    self.emails = items.into_iter().filter_map(|v| v.as_text().map(str::to_string)).collect();
                }
                other => return Err(shape(property, &PropertyValue::Value(other))),
            },
            "tags" => match value.try_into_value(property)? {
                Value::Null => self.tags.clear(),
                Value::Set(items) => {
                    self.tags = items.iter().filter_map(|v| v.as_text().map(str::to_string)).collect();
                }
                other => return Err(shape(property, &PropertyValue::Value(other))),
            },
            "preferences" => match value.try_into_value(property)? {
                Value::Null => self.preferences.clear(),
                Value::Map(entries) => {
                    self.preferences = entries
                        .into_iter()
                        .filter_map(|(k, v)| match (k, v) {
                            (Value::Int(k), Value::Text(v)) => Some((k, v)),
                            _ => None,
                        })
                        .collect();
                }
                other => return Err(shape(property, &PropertyValue::Value(other))),
            },
            "best_friend" => self.best_friend = value.try_into_join(property)?,
            "friends" => self.friends = value.try_into_join_list(property)?,
            "followers" => self.followers = value.try_into_join_list(property)?,
            "favorites" => self.favorites = value.try_into_join_map(property)?,
            "visits" => self.visits = value.try_into_value(property)?.as_long(),
            "tweets" | "timeline" => {}
            _ => return Err(CoreError::unknown_property("User", property)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A wide-row entity: one row of clicks per page.
#[derive(Debug, Clone, Default)]
pub struct ClickLog {
    pub page: String,
}

impl Entity for ClickLog {
    fn class_name(&self) -> &'static str {
        "ClickLog"
    }

    fn get(&self, property: &str) -> Option<PropertyValue> {
        match property {
            "page" if !self.page.is_empty() => Some(PropertyValue::Value(Value::text(&self.page))),
            _ => None,
        }
    }

    fn set(&mut self, property: &str, value: PropertyValue) -> CoreResult<()> {
        match property {
            "page" => self.page = text(property, value)?.unwrap_or_default(),
            "clicks" => {}
            _ => return Err(CoreError::unknown_property("ClickLog", property)),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn new_user() -> Box<dyn Entity> {
    Box::new(User::default())
}

pub fn new_click_log() -> Box<dyn Entity> {
    Box::new(ClickLog::default())
}

fn property(name: &str, ty: PropertyType) -> crate::metadata::PropertyMetaBuilder {
    PropertyMeta::builder(name, ty)
}

/// `User` in table `users`: best friend cascades everything, favorites
/// cascade merges, other joins store keys only.
pub fn user_meta() -> EntityMeta {
    let props = [
        property("name", PropertyType::Simple).value_kind(ValueKind::Text),
        property("age", PropertyType::Simple).value_kind(ValueKind::Int),
        property("emails", PropertyType::List).value_kind(ValueKind::Text),
        property("tags", PropertyType::Set).value_kind(ValueKind::Text),
        property("preferences", PropertyType::Map)
            .key_kind(ValueKind::Int)
            .value_kind(ValueKind::Text),
        property("best_friend", PropertyType::JoinSimple).join("User", CascadeType::All),
        property("friends", PropertyType::JoinList).join("User", CascadeType::None),
        property("followers", PropertyType::JoinSet).join("User", CascadeType::None),
        property("favorites", PropertyType::JoinMap)
            .key_kind(ValueKind::Int)
            .join("User", CascadeType::Merge),
        property("visits", PropertyType::Counter),
        property("tweets", PropertyType::WideMap)
            .key_kind(ValueKind::Long)
            .value_kind(ValueKind::Text)
            .external_column_family("user_tweets"),
        property("timeline", PropertyType::JoinWideMap)
            .key_kind(ValueKind::Long)
            .join("User", CascadeType::None)
            .external_column_family("user_timeline"),
    ];
    props
        .into_iter()
        .fold(
            EntityMeta::builder("User", "users", new_user).id(
                property("id", PropertyType::Id)
                    .value_kind(ValueKind::Long)
                    .build()
                    .unwrap(),
            ),
            |meta, pm| meta.property(pm.build().unwrap()),
        )
        .build()
        .unwrap()
}

/// `ClickLog`: a wide row keyed by page, one `Long` column per click time.
pub fn click_log_meta() -> EntityMeta {
    EntityMeta::builder("ClickLog", "click_log", new_click_log)
        .id(property("page", PropertyType::Id)
            .value_kind(ValueKind::Text)
            .build()
            .unwrap())
        .property(
            property("clicks", PropertyType::WideMap)
                .key_kind(ValueKind::Long)
                .value_kind(ValueKind::Long)
                .external_column_family("click_log")
                .build()
                .unwrap(),
        )
        .wide_row(true)
        .build()
        .unwrap()
}

/// Join entity loader recording the keys of every call.
#[derive(Debug, Default)]
pub struct RecordingJoinEntityLoader {
    calls: Mutex<Vec<Vec<Value>>>,
}

impl RecordingJoinEntityLoader {
    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.calls.lock().clone()
    }
}

impl JoinEntityLoader for RecordingJoinEntityLoader {
    fn load_join_entities(
        &self,
        context: &PersistenceContext,
        join_meta: &Arc<EntityMeta>,
        keys: &[Value],
        join_dao: &EntityDao,
        nested: &Arc<dyn JoinEntityLoader>,
    ) -> CoreResult<HashMap<Value, EntityProxy>> {
        self.calls.lock().push(keys.to_vec());
        BatchJoinEntityLoader::new().load_join_entities(context, join_meta, keys, join_dao, nested)
    }
}

/// An in-memory store with `User` and `ClickLog` mapped.
pub struct Stack {
    pub store: Arc<InMemoryColumnStore>,
    pub registry: Arc<EntityMetaRegistry>,
    pub config: Arc<ConfigurationContext>,
    pub daos: Arc<DaoContext>,
}

impl Stack {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryColumnStore::new());
        let registry = EntityMetaRegistry::new([user_meta(), click_log_meta()]).unwrap();
        let config = ConfigurationContext::new(Config::default());
        let column_store: Arc<dyn ColumnStore> = Arc::clone(&store) as Arc<dyn ColumnStore>;
        let daos = DaoContextBuilder::new()
            .build(&column_store, &registry, &config, registry.has_counter())
            .unwrap();
        Self {
            store,
            registry: Arc::new(registry),
            config: Arc::new(config),
            daos: Arc::new(daos),
        }
    }

    pub fn flush_context(&self, strategy: FlushStrategy) -> SharedFlushContext {
        FlushContext::new(
            strategy,
            Arc::clone(&self.daos),
            Arc::clone(self.config.consistency_policy()),
        )
        .into_shared()
    }

    pub fn context_for_key(
        &self,
        class_name: &str,
        key: Value,
        strategy: FlushStrategy,
    ) -> CoreResult<PersistenceContext> {
        let meta = Arc::clone(self.registry.require(class_name)?);
        PersistenceContext::for_key(
            meta,
            Arc::clone(&self.config),
            Arc::clone(&self.daos),
            self.flush_context(strategy),
            key,
        )
    }

    pub fn context_for_entity(
        &self,
        entity: &dyn Entity,
        strategy: FlushStrategy,
    ) -> CoreResult<PersistenceContext> {
        let meta = Arc::clone(self.registry.require(entity.class_name())?);
        PersistenceContext::for_entity(
            meta,
            Arc::clone(&self.config),
            Arc::clone(&self.daos),
            self.flush_context(strategy),
            entity,
        )
    }

    /// Writes raw columns of one `User` property.
    pub fn store_columns(
        &self,
        id: i64,
        property: &str,
        columns: impl FnOnce(&CompositeFactory, &PropertyMeta) -> Vec<(Composite, String)>,
    ) {
        let ctx = self
            .context_for_key("User", Value::Long(id), FlushStrategy::Immediate)
            .unwrap();
        let pm = Arc::clone(ctx.entity_meta().require_property(property).unwrap());
        let dao = Arc::clone(ctx.require_entity_dao().unwrap());
        let columns = columns(&CompositeFactory::new(), &pm);
        ctx.with_entity_mutator("users", |m| {
            for (column, value) in columns {
                dao.insert_column(m, &Value::Long(id), column, &value, &Options::default())?;
            }
            Ok(())
        })
        .unwrap();
        ctx.flush().unwrap();
    }

    /// Writes a `User` row holding only a name.
    pub fn store_user(&self, id: i64, name: &str) {
        self.store_columns(id, "name", |f, pm| {
            vec![
                (f.create_eager_marker(), String::new()),
                (f.create_for_simple(pm), name.to_string()),
            ]
        });
    }

    /// Wraps a user in a proxy without writing it.
    pub fn manage(&self, user: User) -> EntityProxy {
        let ctx = self.context_for_entity(&user, FlushStrategy::Immediate).unwrap();
        EntityInterceptorBuilder::builder(ctx, Box::new(user))
            .eager_loaded()
            .build_proxy()
            .unwrap()
    }

    pub fn manage_click_log(&self, page: &str) -> EntityProxy {
        let log = ClickLog { page: page.to_string() };
        let ctx = self.context_for_entity(&log, FlushStrategy::Immediate).unwrap();
        EntityInterceptorBuilder::builder(ctx, Box::new(log))
            .build_proxy()
            .unwrap()
    }

    /// Persists a user and returns its proxy.
    pub fn persist(&self, user: User) -> EntityProxy {
        let ctx = self.context_for_entity(&user, FlushStrategy::Immediate).unwrap();
        EntityPersister::new().persist(&ctx, &user).unwrap();
        ctx.flush().unwrap();
        let present: Vec<String> = ctx
            .entity_meta()
            .properties()
            .filter(|pm| user.get(pm.name()).is_some())
            .map(|pm| pm.name().to_string())
            .collect();
        EntityInterceptorBuilder::builder(ctx, Box::new(user))
            .eager_loaded()
            .lazy_loaded(present)
            .build_proxy()
            .unwrap()
    }

    /// Loads the eager columns of a stored user.
    pub fn load_user(&self, id: i64) -> Option<User> {
        let ctx = self
            .context_for_key("User", Value::Long(id), FlushStrategy::Immediate)
            .unwrap();
        EntityLoader::new(Arc::new(BatchJoinEntityLoader::new()))
            .load(&ctx)
            .unwrap()
            .map(|entity| entity.downcast_ref::<User>().unwrap().clone())
    }
}

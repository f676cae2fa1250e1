//! # wideorm core
//!
//! Entity mapping kernel for wide-column stores.
//!
//! This crate provides:
//! - Entity metadata and the [`Entity`] accessor table
//! - The [`ConsistencyPolicy`] resolving read and write levels
//! - The [`DaoContext`] registry of column family DAOs
//! - [`FlushContext`], which accumulates and submits mutations
//! - [`PersistenceContext`], threaded through every entity operation
//! - [`EntityProxy`], which loads lazily and tracks changes
//! - The [`EntityManager`] tying them together
//!
//! ## Storage model
//!
//! An entity is one row of its table. Each property is stored in columns
//! named `[type flag, property name, discriminator]`, so one slice query
//! reads all eager properties and one range query reads any collection.
//! Wide maps live in their own column family, one row per owner. Counters
//! share the `wideorm_counter` column family.
//!
//! ## Example
//!
//! ```
//! use std::any::Any;
//! use std::sync::Arc;
//! use wideorm_codec::{Value, ValueKind};
//! use wideorm_core::{
//!     Config, CoreError, CoreResult, Entity, EntityManagerFactory, EntityMeta, PropertyMeta,
//!     PropertyType, PropertyValue,
//! };
//! use wideorm_storage::InMemoryColumnStore;
//!
//! #[derive(Debug, Default)]
//! struct Song {
//!     id: i64,
//!     title: Option<String>,
//! }
//!
//! impl Entity for Song {
//!     fn class_name(&self) -> &'static str {
//!         "Song"
//!     }
//!
//!     fn get(&self, property: &str) -> Option<PropertyValue> {
//!         match property {
//!             "id" => Some(Value::Long(self.id).into()),
//!             "title" => self.title.clone().map(|t| Value::text(t).into()),
//!             _ => None,
//!         }
//!     }
//!
//!     fn set(&mut self, property: &str, value: PropertyValue) -> CoreResult<()> {
//!         match (property, value.try_into_value(property)?) {
//!             ("id", Value::Long(id)) => self.id = id,
//!             ("title", Value::Text(t)) => self.title = Some(t),
//!             ("title", Value::Null) => self.title = None,
//!             _ => return Err(CoreError::validation(format!("bad value for {property}"))),
//!         }
//!         Ok(())
//!     }
//!
//!     fn as_any(&self) -> &dyn Any {
//!         self
//!     }
//!
//!     fn as_any_mut(&mut self) -> &mut dyn Any {
//!         self
//!     }
//! }
//!
//! fn new_song() -> Box<dyn Entity> {
//!     Box::new(Song::default())
//! }
//!
//! let meta = EntityMeta::builder("Song", "songs", new_song)
//!     .id(PropertyMeta::builder("id", PropertyType::Id).value_kind(ValueKind::Long).build()?)
//!     .property(PropertyMeta::builder("title", PropertyType::Simple).build()?)
//!     .build()?;
//! let factory = EntityManagerFactory::new(Config::new(), Arc::new(InMemoryColumnStore::new()), [meta])?;
//! let manager = factory.create_entity_manager();
//!
//! manager.persist(Box::new(Song { id: 1, title: Some("Blue".into()) }))?;
//! let song = manager.find("Song", 1_i64)?.expect("stored");
//! assert_eq!(song.get_value("title")?, Some(Value::text("Blue")));
//! # Ok::<(), CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod composite_factory;
mod config;
mod consistency;
mod context;
mod dao;
mod entity;
mod error;
mod manager;
mod metadata;
mod operations;
mod options;
mod proxy;
mod wide_map;

#[cfg(test)]
mod testing;

pub use composite_factory::CompositeFactory;
pub use config::{Config, ConfigurationContext, FlushStrategy};
pub use consistency::{ConsistencyPolicy, OperationKind};
pub use context::{
    DaoContext, DaoContextBuilder, FlushContext, FlushState, PersistenceContext, SharedFlushContext, TableDao,
};
pub use dao::{CounterDao, EntityColumns, EntityDao, Mutator, WideRowDao};
pub use entity::{Entity, PropertyValue};
pub use error::{CoreError, CoreResult};
pub use manager::{EntityManager, EntityManagerFactory};
pub use metadata::{
    CascadeType, EntityFactory, EntityMeta, EntityMetaBuilder, EntityMetaRegistry, JoinProperties, PropertyMeta,
    PropertyMetaBuilder, PropertyType,
};
pub use operations::{
    BatchJoinEntityLoader, EntityLoader, EntityMerger, EntityPersister, JoinEntityLoader, JoinLoader,
};
pub use options::{Options, OptionsBuilder};
pub use proxy::{EntityInterceptor, EntityInterceptorBuilder, EntityProxy};
pub use wide_map::{JoinWideMap, WideMap};

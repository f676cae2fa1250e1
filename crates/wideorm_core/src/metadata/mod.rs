//! Entity and property metadata.
//!
//! Metadata is computed once at startup, linked by an
//! [`EntityMetaRegistry`] and shared read-only afterwards.

mod entity;
mod property;
mod registry;

pub use entity::{EntityFactory, EntityMeta, EntityMetaBuilder};
pub use property::{CascadeType, JoinProperties, PropertyMeta, PropertyMetaBuilder, PropertyType};
pub use registry::EntityMetaRegistry;

//! Entity metadata.

use super::{PropertyMeta, PropertyType};
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use wideorm_codec::ValueKind;

/// Creates an empty instance of a mapped entity.
pub type EntityFactory = fn() -> Box<dyn Entity>;

/// Metadata of one mapped entity class.
///
/// Every property belongs to exactly one `EntityMeta`. The id property is
/// kept apart from the others.
#[derive(Debug)]
pub struct EntityMeta {
    class_name: String,
    table_name: String,
    id_meta: Option<Arc<PropertyMeta>>,
    properties: BTreeMap<String, Arc<PropertyMeta>>,
    wide_row: bool,
    factory: EntityFactory,
}

impl EntityMeta {
    /// Starts building entity metadata.
    pub fn builder(
        class_name: impl Into<String>,
        table_name: impl Into<String>,
        factory: EntityFactory,
    ) -> EntityMetaBuilder {
        EntityMetaBuilder {
            class_name: class_name.into(),
            table_name: table_name.into(),
            id_meta: None,
            properties: Vec::new(),
            wide_row: false,
            factory,
        }
    }

    /// Returns the entity class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Returns the column family holding the entity rows.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the id property, if declared.
    #[must_use]
    pub fn id_meta(&self) -> Option<&Arc<PropertyMeta>> {
        self.id_meta.as_ref()
    }

    /// Returns the id property.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no id is declared.
    pub fn require_id_meta(&self) -> CoreResult<&Arc<PropertyMeta>> {
        self.id_meta.as_ref().ok_or_else(|| {
            CoreError::configuration(format!("entity {} declares no id property", self.class_name))
        })
    }

    /// Returns the declared kind of the primary key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no id is declared.
    pub fn id_kind(&self) -> CoreResult<&ValueKind> {
        Ok(self.require_id_meta()?.value_kind())
    }

    /// Returns a non-id property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Arc<PropertyMeta>> {
        self.properties.get(name)
    }

    /// Returns a non-id property by name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnknownProperty`] if no such property exists.
    pub fn require_property(&self, name: &str) -> CoreResult<&Arc<PropertyMeta>> {
        self.property(name)
            .ok_or_else(|| CoreError::unknown_property(&self.class_name, name))
    }

    /// Iterates over non-id properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = &Arc<PropertyMeta>> {
        self.properties.values()
    }

    /// Iterates over the properties stored among the eager columns.
    pub fn eager_properties(&self) -> impl Iterator<Item = &Arc<PropertyMeta>> {
        self.properties
            .values()
            .filter(|pm| pm.property_type() == PropertyType::Simple)
    }

    /// Returns true if the entity is stored as a single wide row.
    #[must_use]
    pub const fn is_wide_row(&self) -> bool {
        self.wide_row
    }

    /// Returns true if any property is a counter.
    #[must_use]
    pub fn has_counter(&self) -> bool {
        self.properties
            .values()
            .any(|pm| pm.property_type().is_counter() || pm.value_kind() == &ValueKind::Counter)
    }

    /// Returns true if `name` is the id property.
    #[must_use]
    pub fn is_id(&self, name: &str) -> bool {
        self.id_meta.as_ref().is_some_and(|id| id.name() == name)
    }

    /// Creates an empty instance.
    #[must_use]
    pub fn instantiate(&self) -> Box<dyn Entity> {
        (self.factory)()
    }
}

/// Builder for [`EntityMeta`].
#[derive(Debug)]
#[must_use]
pub struct EntityMetaBuilder {
    class_name: String,
    table_name: String,
    id_meta: Option<PropertyMeta>,
    properties: Vec<PropertyMeta>,
    wide_row: bool,
    factory: EntityFactory,
}

impl EntityMetaBuilder {
    /// Sets the id property.
    pub fn id(mut self, id_meta: PropertyMeta) -> Self {
        self.id_meta = Some(id_meta);
        self
    }

    /// Adds a property.
    pub fn property(mut self, property: PropertyMeta) -> Self {
        self.properties.push(property);
        self
    }

    /// Marks the entity as a wide row.
    pub fn wide_row(mut self, wide_row: bool) -> Self {
        self.wide_row = wide_row;
        self
    }

    /// Builds the metadata.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on duplicate property names, an id
    /// that is not of type `Id`, or a wide row holding columns other than
    /// wide maps.
    pub fn build(self) -> CoreResult<EntityMeta> {
        if let Some(id) = &self.id_meta {
            if id.property_type() != PropertyType::Id {
                return Err(CoreError::configuration(format!(
                    "id property {}.{} must be of type ID",
                    self.class_name,
                    id.name()
                )));
            }
        }

        let mut properties = BTreeMap::new();
        for pm in self.properties {
            if pm.property_type() == PropertyType::Id {
                return Err(CoreError::configuration(format!(
                    "{}.{} is an id; declare it with id()",
                    self.class_name,
                    pm.name()
                )));
            }
            if self.wide_row && !pm.property_type().is_wide_map() {
                return Err(CoreError::configuration(format!(
                    "wide row entity {} can only hold wide maps, found {}.{}",
                    self.class_name,
                    self.class_name,
                    pm.name()
                )));
            }
            let name = pm.name().to_string();
            if properties.insert(name.clone(), Arc::new(pm)).is_some() {
                return Err(CoreError::configuration(format!(
                    "duplicate property {}.{name}",
                    self.class_name
                )));
            }
        }

        Ok(EntityMeta {
            class_name: self.class_name,
            table_name: self.table_name,
            id_meta: self.id_meta.map(Arc::new),
            properties,
            wide_row: self.wide_row,
            factory: self.factory,
        })
    }
}

//! Property metadata.

use super::EntityMeta;
use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use wideorm_codec::{DataTranscoder, JsonTranscoder, Value, ValueKind};

/// Storage shape of a mapped property.
///
/// Each type has a stable flag used as the first component of its column
/// names, so the columns of one type sort together within an entity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyType {
    /// Marker column opening the eager range.
    StartEager,
    /// Single value, loaded eagerly.
    Simple,
    /// Ordered list of values.
    List,
    /// Set of values.
    Set,
    /// Map of values.
    Map,
    /// Reference to one entity.
    JoinSimple,
    /// Ordered list of entity references.
    JoinList,
    /// Set of entity references.
    JoinSet,
    /// Map of entity references.
    JoinMap,
    /// Distributed counter.
    Counter,
    /// Wide map stored in its own row.
    WideMap,
    /// Wide map of entity references stored in its own row.
    JoinWideMap,
    /// Primary key.
    Id,
}

impl PropertyType {
    /// Returns the column flag of this type.
    #[must_use]
    pub const fn flag(self) -> u8 {
        match self {
            PropertyType::StartEager => 0,
            PropertyType::Simple => 1,
            PropertyType::List => 2,
            PropertyType::Set => 3,
            PropertyType::Map => 4,
            PropertyType::JoinSimple => 5,
            PropertyType::JoinList => 6,
            PropertyType::JoinSet => 7,
            PropertyType::JoinMap => 8,
            PropertyType::Counter => 9,
            PropertyType::WideMap => 10,
            PropertyType::JoinWideMap => 11,
            PropertyType::Id => 12,
        }
    }

    /// Returns the flag as a composite component.
    #[must_use]
    pub fn flag_value(self) -> Value {
        Value::Int(i32::from(self.flag()))
    }

    /// Loaded with the entity row.
    #[must_use]
    pub const fn is_eager(self) -> bool {
        matches!(
            self,
            PropertyType::StartEager | PropertyType::Simple | PropertyType::Id
        )
    }

    /// Loaded on first access.
    #[must_use]
    pub const fn is_lazy(self) -> bool {
        !self.is_eager()
    }

    /// References other entities.
    #[must_use]
    pub const fn is_join_column(self) -> bool {
        matches!(
            self,
            PropertyType::JoinSimple
                | PropertyType::JoinList
                | PropertyType::JoinSet
                | PropertyType::JoinMap
                | PropertyType::JoinWideMap
        )
    }

    /// Stored in its own wide row.
    #[must_use]
    pub const fn is_wide_map(self) -> bool {
        matches!(self, PropertyType::WideMap | PropertyType::JoinWideMap)
    }

    /// Stored in the counter column family.
    #[must_use]
    pub const fn is_counter(self) -> bool {
        matches!(self, PropertyType::Counter)
    }

    /// Stored as columns of the entity row.
    #[must_use]
    pub const fn is_entity_row_column(self) -> bool {
        !self.is_wide_map() && !self.is_counter() && !matches!(self, PropertyType::Id)
    }

    /// Needs a key kind.
    #[must_use]
    pub const fn is_keyed(self) -> bool {
        matches!(
            self,
            PropertyType::Map | PropertyType::JoinMap | PropertyType::WideMap | PropertyType::JoinWideMap
        )
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::StartEager => "START_EAGER",
            PropertyType::Simple => "SIMPLE",
            PropertyType::List => "LIST",
            PropertyType::Set => "SET",
            PropertyType::Map => "MAP",
            PropertyType::JoinSimple => "JOIN_SIMPLE",
            PropertyType::JoinList => "JOIN_LIST",
            PropertyType::JoinSet => "JOIN_SET",
            PropertyType::JoinMap => "JOIN_MAP",
            PropertyType::Counter => "COUNTER",
            PropertyType::WideMap => "WIDE_MAP",
            PropertyType::JoinWideMap => "JOIN_WIDE_MAP",
            PropertyType::Id => "ID",
        };
        f.write_str(name)
    }
}

/// Which entity manager operations propagate through a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadeType {
    /// Only the join key is written.
    #[default]
    None,
    /// Persisting the owner persists the joined entity.
    Persist,
    /// Merging the owner merges the joined entity.
    Merge,
    /// Both persist and merge.
    All,
}

impl CascadeType {
    /// Persist propagates.
    #[must_use]
    pub const fn cascades_persist(self) -> bool {
        matches!(self, CascadeType::Persist | CascadeType::All)
    }

    /// Merge propagates.
    #[must_use]
    pub const fn cascades_merge(self) -> bool {
        matches!(self, CascadeType::Merge | CascadeType::All)
    }
}

/// Join target of a join property.
///
/// The target metadata is linked by the registry after every entity is
/// known, which allows self joins and cycles between entities.
#[derive(Debug)]
pub struct JoinProperties {
    entity_class: String,
    cascade: CascadeType,
    entity_meta: OnceLock<Weak<EntityMeta>>,
}

impl JoinProperties {
    /// Creates unlinked join properties.
    pub fn new(entity_class: impl Into<String>, cascade: CascadeType) -> Self {
        Self {
            entity_class: entity_class.into(),
            cascade,
            entity_meta: OnceLock::new(),
        }
    }

    /// Returns the joined entity class.
    #[must_use]
    pub fn entity_class(&self) -> &str {
        &self.entity_class
    }

    /// Returns the cascade type.
    #[must_use]
    pub const fn cascade(&self) -> CascadeType {
        self.cascade
    }

    /// Returns the joined entity metadata.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the registry never linked the
    /// target or has been dropped.
    pub fn entity_meta(&self) -> CoreResult<Arc<EntityMeta>> {
        self.entity_meta
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| {
                CoreError::configuration(format!(
                    "join target {} is not linked to registered metadata",
                    self.entity_class
                ))
            })
    }

    pub(crate) fn link(&self, meta: &Arc<EntityMeta>) {
        // First registry wins.
        let _ = self.entity_meta.set(Arc::downgrade(meta));
    }
}

/// Metadata of one mapped property.
#[derive(Debug)]
pub struct PropertyMeta {
    name: String,
    property_type: PropertyType,
    key_kind: Option<ValueKind>,
    value_kind: ValueKind,
    join: Option<JoinProperties>,
    external_column_family: Option<String>,
    transcoder: Arc<dyn DataTranscoder>,
}

impl PropertyMeta {
    /// Starts building a property.
    pub fn builder(name: impl Into<String>, property_type: PropertyType) -> PropertyMetaBuilder {
        PropertyMetaBuilder {
            name: name.into(),
            property_type,
            key_kind: None,
            value_kind: None,
            join: None,
            external_column_family: None,
            transcoder: None,
        }
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the property type.
    #[must_use]
    pub const fn property_type(&self) -> PropertyType {
        self.property_type
    }

    /// Returns the key kind of map-like properties.
    #[must_use]
    pub fn key_kind(&self) -> Option<&ValueKind> {
        self.key_kind.as_ref()
    }

    /// Returns the value kind. Element kind for lists and sets.
    #[must_use]
    pub fn value_kind(&self) -> &ValueKind {
        &self.value_kind
    }

    /// Returns the join properties of join columns.
    #[must_use]
    pub fn join_properties(&self) -> Option<&JoinProperties> {
        self.join.as_ref()
    }

    /// Returns the column family of wide maps.
    #[must_use]
    pub fn external_column_family(&self) -> Option<&str> {
        self.external_column_family.as_deref()
    }

    /// Returns the transcoder.
    #[must_use]
    pub fn transcoder(&self) -> &Arc<dyn DataTranscoder> {
        &self.transcoder
    }

    /// Returns the joined entity metadata.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for non-join properties or unlinked
    /// targets.
    pub fn join_entity_meta(&self) -> CoreResult<Arc<EntityMeta>> {
        self.join
            .as_ref()
            .ok_or_else(|| CoreError::configuration(format!("property {} is not a join column", self.name)))?
            .entity_meta()
    }

    /// Encodes a value to its stored text form.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the value cannot be encoded.
    pub fn encode_value(&self, value: &Value) -> CoreResult<String> {
        Ok(self.transcoder.encode(value, &self.value_kind)?)
    }

    /// Encodes a map key to its stored text form.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the key cannot be encoded, or a
    /// configuration error if the property has no key kind.
    pub fn encode_key(&self, key: &Value) -> CoreResult<String> {
        let kind = self.require_key_kind()?;
        Ok(self.transcoder.encode(key, kind)?)
    }

    /// Decodes a stored value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] naming this property.
    pub fn decode_value(&self, raw: &str) -> CoreResult<Value> {
        self.transcoder
            .force_decode_from_json(raw, &self.value_kind)
            .map_err(|e| CoreError::decode(&self.name, raw, e))
    }

    /// Decodes a stored map key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] naming this property, or a
    /// configuration error if the property has no key kind.
    pub fn decode_key(&self, raw: &str) -> CoreResult<Value> {
        let kind = self.require_key_kind()?;
        self.transcoder
            .force_decode_from_json(raw, kind)
            .map_err(|e| CoreError::decode(&self.name, raw, e))
    }

    /// Returns the key kind or a configuration error.
    ///
    /// # Errors
    ///
    /// Fails if the property has no key kind.
    pub fn require_key_kind(&self) -> CoreResult<&ValueKind> {
        self.key_kind
            .as_ref()
            .ok_or_else(|| CoreError::configuration(format!("property {} has no key type", self.name)))
    }
}

/// Builder for [`PropertyMeta`].
#[derive(Debug)]
#[must_use]
pub struct PropertyMetaBuilder {
    name: String,
    property_type: PropertyType,
    key_kind: Option<ValueKind>,
    value_kind: Option<ValueKind>,
    join: Option<JoinProperties>,
    external_column_family: Option<String>,
    transcoder: Option<Arc<dyn DataTranscoder>>,
}

impl PropertyMetaBuilder {
    /// Sets the value kind.
    pub fn value_kind(mut self, kind: ValueKind) -> Self {
        self.value_kind = Some(kind);
        self
    }

    /// Sets the key kind.
    pub fn key_kind(mut self, kind: ValueKind) -> Self {
        self.key_kind = Some(kind);
        self
    }

    /// Makes this a join to `entity_class`.
    pub fn join(mut self, entity_class: impl Into<String>, cascade: CascadeType) -> Self {
        self.join = Some(JoinProperties::new(entity_class, cascade));
        self
    }

    /// Sets the column family of a wide map.
    pub fn external_column_family(mut self, column_family: impl Into<String>) -> Self {
        self.external_column_family = Some(column_family.into());
        self
    }

    /// Replaces the default JSON transcoder.
    pub fn transcoder(mut self, transcoder: Arc<dyn DataTranscoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Builds the property.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a join type has no target, a keyed
    /// type has no key kind or a wide map has no column family.
    pub fn build(self) -> CoreResult<PropertyMeta> {
        let ty = self.property_type;
        if ty.is_join_column() != self.join.is_some() {
            return Err(CoreError::configuration(format!(
                "property {} of type {ty} must{} declare a join target",
                self.name,
                if ty.is_join_column() { "" } else { " not" }
            )));
        }
        if ty.is_keyed() && self.key_kind.is_none() {
            return Err(CoreError::configuration(format!(
                "property {} of type {ty} needs a key type",
                self.name
            )));
        }
        if ty.is_wide_map() && self.external_column_family.is_none() {
            return Err(CoreError::configuration(format!(
                "wide map {} needs a column family",
                self.name
            )));
        }
        if matches!(ty, PropertyType::StartEager) {
            return Err(CoreError::configuration(format!(
                "property {} cannot use the reserved type {ty}",
                self.name
            )));
        }

        let value_kind = match (&self.join, ty) {
            (Some(join), _) => ValueKind::Object(join.entity_class().to_string()),
            (None, PropertyType::Counter) => ValueKind::Counter,
            (None, _) => self.value_kind.unwrap_or(ValueKind::Text),
        };

        Ok(PropertyMeta {
            name: self.name,
            property_type: ty,
            key_kind: self.key_kind,
            value_kind,
            join: self.join,
            external_column_family: self.external_column_family,
            transcoder: self.transcoder.unwrap_or_else(|| Arc::new(JsonTranscoder::new())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_stable() {
        let types = [
            PropertyType::StartEager,
            PropertyType::Simple,
            PropertyType::List,
            PropertyType::Set,
            PropertyType::Map,
            PropertyType::JoinSimple,
            PropertyType::JoinList,
            PropertyType::JoinSet,
            PropertyType::JoinMap,
            PropertyType::Counter,
            PropertyType::WideMap,
            PropertyType::JoinWideMap,
            PropertyType::Id,
        ];
        for (expected, ty) in types.iter().enumerate() {
            assert_eq!(usize::from(ty.flag()), expected);
        }
    }

    #[test]
    fn lazy_and_eager_partition_types() {
        assert!(PropertyType::Simple.is_eager());
        assert!(PropertyType::Id.is_eager());
        assert!(PropertyType::List.is_lazy());
        assert!(PropertyType::JoinList.is_lazy());
        assert!(PropertyType::Counter.is_lazy());
        assert!(PropertyType::JoinWideMap.is_join_column());
        assert!(PropertyType::JoinWideMap.is_wide_map());
        assert!(!PropertyType::Counter.is_entity_row_column());
    }

    #[test]
    fn cascade_types() {
        assert!(CascadeType::All.cascades_persist());
        assert!(CascadeType::All.cascades_merge());
        assert!(!CascadeType::Merge.cascades_persist());
        assert!(!CascadeType::None.cascades_merge());
    }

    #[test]
    fn join_types_need_a_target() {
        let err = PropertyMeta::builder("friends", PropertyType::JoinList)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));

        let err = PropertyMeta::builder("name", PropertyType::Simple)
            .join("User", CascadeType::None)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn maps_need_a_key_kind() {
        let err = PropertyMeta::builder("preferences", PropertyType::Map)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("key type"));
    }

    #[test]
    fn wide_maps_need_a_column_family() {
        let err = PropertyMeta::builder("tweets", PropertyType::WideMap)
            .key_kind(ValueKind::Long)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("column family"));
    }

    #[test]
    fn join_value_kind_is_the_target_class() {
        let pm = PropertyMeta::builder("friends", PropertyType::JoinList)
            .join("User", CascadeType::All)
            .build()
            .unwrap();
        assert_eq!(pm.value_kind(), &ValueKind::Object("User".into()));
        assert!(pm.join_entity_meta().is_err());
    }

    #[test]
    fn object_values_and_typed_keys_read_back() {
        let status = PropertyMeta::builder("status", PropertyType::Simple)
            .value_kind(ValueKind::Object("Status".into()))
            .build()
            .unwrap();
        let raw = status.encode_value(&Value::text("ACTIVE")).unwrap();
        assert_eq!(status.decode_value(&raw).unwrap(), Value::text("ACTIVE"));

        let scores = PropertyMeta::builder("scores", PropertyType::Map)
            .key_kind(ValueKind::Int)
            .value_kind(ValueKind::Long)
            .build()
            .unwrap();
        let raw = scores.encode_key(&Value::Int(7)).unwrap();
        assert_eq!(scores.decode_key(&raw).unwrap(), Value::Int(7));
        assert!(status.encode_key(&Value::Int(7)).is_err());
    }

    #[test]
    fn decode_errors_name_the_property() {
        let pm = PropertyMeta::builder("age", PropertyType::Simple)
            .value_kind(ValueKind::Int)
            .build()
            .unwrap();
        assert_eq!(pm.decode_value("42").unwrap(), Value::Int(42));

        match pm.decode_value("forty") {
            Err(CoreError::Decode { property, raw, .. }) => {
                assert_eq!(property, "age");
                assert_eq!(raw, "forty");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

//! Column names of entity rows, wide rows and counters.
//!
//! Entity-row columns are `[flag, property name, discriminator]`:
//!
//! | type            | discriminator               |
//! |-----------------|-----------------------------|
//! | simple, join    | empty text                  |
//! | list, join list | position as `Long`          |
//! | set, join set   | encoded element             |
//! | map, join map   | encoded key                 |
//!
//! Wide-row columns are the bare map key. Counter columns are the bare
//! property name.

use crate::metadata::{PropertyMeta, PropertyType};
use wideorm_codec::{ComponentEquality, Composite, Value};

/// Builds column names and range bounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompositeFactory;

impl CompositeFactory {
    /// Creates a factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn base(pm: &PropertyMeta) -> Composite {
        Composite::new()
            .with(pm.property_type().flag_value())
            .with(Value::text(pm.name()))
    }

    /// Returns `[flag, name]` with `equality` on the name.
    ///
    /// `Equal` bounds the start of the property's columns and
    /// `GreaterThanEqual` bounds their end.
    #[must_use]
    pub fn create_base_for_query(&self, pm: &PropertyMeta, equality: ComponentEquality) -> Composite {
        Composite::new()
            .with(pm.property_type().flag_value())
            .with_bound(Value::text(pm.name()), equality)
    }

    /// Returns the inclusive bounds of every column of one property.
    #[must_use]
    pub fn create_property_range(&self, pm: &PropertyMeta) -> (Composite, Composite) {
        (
            self.create_base_for_query(pm, ComponentEquality::Equal),
            self.create_base_for_query(pm, ComponentEquality::GreaterThanEqual),
        )
    }

    /// Column of a simple property.
    #[must_use]
    pub fn create_for_simple(&self, pm: &PropertyMeta) -> Composite {
        Self::base(pm).with(Value::text(""))
    }

    /// Column of a join simple property.
    #[must_use]
    pub fn create_for_join_simple(&self, pm: &PropertyMeta) -> Composite {
        self.create_for_simple(pm)
    }

    /// Column of one list element.
    #[must_use]
    pub fn create_for_list(&self, pm: &PropertyMeta, index: usize) -> Composite {
        let position = i64::try_from(index).unwrap_or(i64::MAX);
        Self::base(pm).with(Value::Long(position))
    }

    /// Column of one set element.
    #[must_use]
    pub fn create_for_set(&self, pm: &PropertyMeta, element: &str) -> Composite {
        Self::base(pm).with(Value::text(element))
    }

    /// Column of one map entry.
    #[must_use]
    pub fn create_for_map(&self, pm: &PropertyMeta, key: &str) -> Composite {
        Self::base(pm).with(Value::text(key))
    }

    /// Marker column written with every entity row.
    #[must_use]
    pub fn create_eager_marker(&self) -> Composite {
        Composite::new()
            .with(PropertyType::StartEager.flag_value())
            .with(Value::text(""))
            .with(Value::text(""))
    }

    /// Bounds of the eager columns: the marker and every simple property.
    #[must_use]
    pub fn create_eager_range(&self) -> (Composite, Composite) {
        (
            Composite::new().with(PropertyType::StartEager.flag_value()),
            Composite::new().with_bound(
                PropertyType::Simple.flag_value(),
                ComponentEquality::GreaterThanEqual,
            ),
        )
    }

    /// Column of one wide map entry.
    #[must_use]
    pub fn create_for_wide_map(&self, key: &Value) -> Composite {
        Composite::new().with(key.clone())
    }

    /// Inclusive bounds of a wide map query, in walk order.
    #[must_use]
    pub fn create_wide_map_bounds(
        &self,
        start: Option<&Value>,
        end: Option<&Value>,
    ) -> (Option<Composite>, Option<Composite>) {
        (
            start.map(|k| self.create_for_wide_map(k)),
            end.map(|k| self.create_for_wide_map(k)),
        )
    }

    /// Column of a counter property.
    #[must_use]
    pub fn create_counter_column(&self, pm: &PropertyMeta) -> Composite {
        Composite::new().with(Value::text(pm.name()))
    }
}

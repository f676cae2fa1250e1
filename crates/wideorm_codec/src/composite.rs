//! Composite column names.
//!
//! A composite is an ordered list of components. Each component carries a
//! value and an equality marker that only matters for range bounds:
//!
//! - `Equal` on the last component of a prefix selects the first column
//!   that starts with the prefix
//! - `GreaterThanEqual` selects past the last column that starts with it
//! - `LessThanEqual` selects before the first column that starts with it
//!
//! ```
//! use wideorm_codec::{Composite, ComponentEquality, Value};
//!
//! let column = Composite::new()
//!     .with(Value::Int(6))
//!     .with(Value::text("friends"))
//!     .with(Value::Long(0));
//! let start = Composite::new().with(Value::Int(6)).with(Value::text("friends"));
//! let end = Composite::new()
//!     .with(Value::Int(6))
//!     .with_bound(Value::text("friends"), ComponentEquality::GreaterThanEqual);
//! assert!(start < column && column < end);
//! ```

use crate::value::Value;
use std::cmp::Ordering;
use std::fmt;

/// Equality marker ending a composite component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ComponentEquality {
    /// Sorts before every extension of the prefix.
    LessThanEqual,
    /// Exact component.
    #[default]
    Equal,
    /// Sorts after every extension of the prefix.
    GreaterThanEqual,
}

/// One component of a composite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    /// Component value.
    pub value: Value,
    /// Equality marker.
    pub equality: ComponentEquality,
}

/// Multi-component column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Composite {
    components: Vec<Component>,
}

impl Composite {
    /// Creates an empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an exact component.
    #[must_use]
    pub fn with(self, value: Value) -> Self {
        self.with_bound(value, ComponentEquality::Equal)
    }

    /// Appends a component with an explicit equality marker.
    #[must_use]
    pub fn with_bound(mut self, value: Value, equality: ComponentEquality) -> Self {
        self.components.push(Component { value, equality });
        self
    }

    /// Appends an exact component in place.
    pub fn push(&mut self, value: Value) {
        self.components.push(Component {
            value,
            equality: ComponentEquality::Equal,
        });
    }

    /// Returns the components.
    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Returns the value of the component at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.components.get(index).map(|c| &c.value)
    }

    /// Returns the value of the last component.
    #[must_use]
    pub fn last(&self) -> Option<&Value> {
        self.components.last().map(|c| &c.value)
    }

    /// Returns the number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if there are no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl PartialOrd for Composite {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Composite {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.value.cmp(&b.value) {
                Ordering::Equal => {}
                ord => return ord,
            }
            // Same value: a differing marker ends the comparison.
            if a.equality != b.equality {
                return a.equality.cmp(&b.equality);
            }
        }

        match self.components.len().cmp(&other.components.len()) {
            Ordering::Equal => Ordering::Equal,
            // Only reached when every shared marker is Equal, so the
            // shorter side is a plain prefix.
            Ordering::Less => Ordering::Less,
            Ordering::Greater => Ordering::Greater,
        }
    }
}

impl fmt::Display for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{}", c.value)?;
            match c.equality {
                ComponentEquality::Equal => {}
                ComponentEquality::LessThanEqual => f.write_str("<=")?,
                ComponentEquality::GreaterThanEqual => f.write_str(">=")?,
            }
        }
        f.write_str(")")
    }
}

//! # wideorm codec
//!
//! Value representation and wire-format boundaries for wideorm.
//!
//! This crate provides:
//! - [`Value`], the dynamic, totally ordered value every property decodes to
//! - [`ValueKind`], the declared class of a mapped property value
//! - [`Serializer`], the byte codecs used for row keys and wide-row values
//! - [`Composite`], the multi-component column name used to scope range queries
//! - [`DataTranscoder`], the JSON boundary used for entity-row column values
//!
//! ## Usage
//!
//! ```
//! use wideorm_codec::{Serializer, Value, ValueKind};
//!
//! let serializer = Serializer::infer(&ValueKind::Long).unwrap();
//! let bytes = serializer.to_bytes(&Value::Long(42)).unwrap();
//! assert_eq!(serializer.from_bytes(&bytes).unwrap(), Value::Long(42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod composite;
mod error;
mod serializer;
mod transcoder;
mod value;

pub use composite::{Component, ComponentEquality, Composite};
pub use error::{CodecError, CodecResult};
pub use serializer::Serializer;
pub use transcoder::{DataTranscoder, JsonTranscoder};
pub use value::{Value, ValueKind};

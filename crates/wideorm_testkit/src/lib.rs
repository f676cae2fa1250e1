//! # wideorm testkit
//!
//! Test utilities for wideorm.
//!
//! This crate provides:
//! - A small blog domain (`Author`, `Article`) mapped with every property type
//! - In-memory persistence units and manager helpers
//! - Property-based test generators using proptest
//! - A harness that tracks persisted articles and verifies them against the store
//!
//! ## Usage
//!
//! ```rust
//! use wideorm_testkit::prelude::*;
//!
//! with_manager(|manager, store| {
//!     manager.persist(Box::new(Article::new(1, "Hello"))).unwrap();
//!     assert_eq!(store.row_count(ARTICLES), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;

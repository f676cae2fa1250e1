//! # wideorm storage
//!
//! The abstract client session wideorm talks to, plus an in-memory backend.
//!
//! A wide-column store is a set of column families. Each row, addressed by
//! an opaque byte key, holds a sparse set of columns sorted by their
//! [`Composite`](wideorm_codec::Composite) name. Counters live in their
//! own space.
//!
//! ## Design Principles
//!
//! - Backends see only bytes and composite names, never entity metadata
//! - Every call carries the [`ConsistencyLevel`] already resolved by the caller
//! - `multiget_slice` is one round trip, whatever the number of rows
//! - Must be `Send + Sync`; the wire-protocol drivers live outside this crate
//!
//! ## Available Backends
//!
//! - [`InMemoryColumnStore`] - For testing and ephemeral stores
//!
//! ## Example
//!
//! ```rust
//! use wideorm_codec::{Composite, Value};
//! use wideorm_storage::{ColumnStore, ConsistencyLevel, InMemoryColumnStore, Mutation, SliceQuery};
//!
//! let store = InMemoryColumnStore::new();
//! let column = Composite::new().with(Value::text("name"));
//! store
//!     .execute_batch(
//!         "users",
//!         &[Mutation::insert(b"1".to_vec(), column.clone(), b"John".to_vec())],
//!         ConsistencyLevel::One,
//!     )
//!     .unwrap();
//! let slice = store
//!     .get_slice("users", b"1", &SliceQuery::all(), ConsistencyLevel::One)
//!     .unwrap();
//! assert_eq!(slice, vec![(column, b"John".to_vec())]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod consistency;
mod error;
mod memory;
mod mutation;
mod store;

pub use consistency::ConsistencyLevel;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryColumnStore;
pub use mutation::{Mutation, SliceQuery};
pub use store::{ColumnSlice, ColumnStore, RowSlice};

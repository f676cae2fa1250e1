//! Contexts threading DAOs, pending writes and configuration through an
//! operation.

mod dao_context;
mod flush;
mod persistence;

pub use dao_context::{DaoContext, DaoContextBuilder};
pub use flush::{FlushContext, FlushState, SharedFlushContext};
pub use persistence::{PersistenceContext, TableDao};

//! Entity proxies.
//!
//! A proxy wraps a target entity with an [`EntityInterceptor`] that loads
//! lazy properties on first access and records which properties were
//! changed, so a merge only rewrites those.

mod builder;
mod handle;
mod interceptor;

pub use builder::EntityInterceptorBuilder;
pub use handle::EntityProxy;
pub use interceptor::EntityInterceptor;

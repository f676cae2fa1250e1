//! Entity operations: loading, join loading, persisting and merging.

mod join_entity;
mod join_loader;
mod loader;
mod merger;
mod persister;

pub use join_entity::{BatchJoinEntityLoader, JoinEntityLoader};
pub use join_loader::JoinLoader;
pub use loader::EntityLoader;
pub use merger::EntityMerger;
pub use persister::EntityPersister;

use crate::composite_factory::CompositeFactory;
use crate::context::PersistenceContext;
use crate::dao::EntityColumns;
use crate::error::{CoreError, CoreResult};
use crate::metadata::PropertyMeta;
use wideorm_codec::{Composite, Value};

/// Reads every stored column of one entity-row property, ascending.
fn property_columns(
    factory: &CompositeFactory,
    context: &PersistenceContext,
    pm: &PropertyMeta,
) -> CoreResult<EntityColumns> {
    let dao = context.require_entity_dao()?;
    let (start, end) = factory.create_property_range(pm);
    dao.find_columns_range(
        context.primary_key(),
        &start,
        &end,
        false,
        usize::MAX,
        context.read_consistency(),
    )
}

/// Returns the text discriminator ending a set or map column.
fn discriminator<'a>(pm: &PropertyMeta, column: &'a Composite) -> CoreResult<&'a str> {
    column.last().and_then(Value::as_text).ok_or_else(|| {
        CoreError::invalid_state(format!(
            "malformed column {column} for property {}",
            pm.name()
        ))
    })
}

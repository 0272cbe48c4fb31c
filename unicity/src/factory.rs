//! Aggregate construction for rehydration.

use crate::aggregate::{AggregateConstructor, Rehydrate};
use crate::errors::{RepositoryError, RepositoryResult};
use crate::types::AggregateId;

/// Builds an aggregate shell for the given identity.
///
/// Construction follows the policy declared by the type's
/// [`Rehydrate`] capability: an identity constructor if the type has one,
/// otherwise a bare constructor followed by the privileged identity restore,
/// otherwise [`RepositoryError::MissingAggregateConstructor`].
///
/// The snapshot memento is accepted but not restored into aggregate state;
/// a snapshot only anchors where replay starts. Callers wanting true
/// snapshot restoration must do it in their own constructor.
pub fn build_aggregate<A: Rehydrate>(
    id: AggregateId,
    memento: Option<&serde_json::Value>,
) -> RepositoryResult<A> {
    let _ = memento;

    match A::constructor() {
        AggregateConstructor::WithId(build) => Ok(build(id)),
        AggregateConstructor::Bare { new, restore_id } => {
            let mut aggregate = new();
            restore_id(&mut aggregate, id);
            Ok(aggregate)
        }
        AggregateConstructor::Unconstructible => Err(RepositoryError::MissingAggregateConstructor {
            aggregate_type: A::aggregate_type(),
        }),
    }
}

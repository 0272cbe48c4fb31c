//! The aggregate capability contract.
//!
//! The repository never sees an aggregate's domain API. It observes and
//! mutates aggregates only through [`Aggregate`]: apply an event, read or
//! clear the uncommitted buffer, read the derived constraint set. The
//! [`Rehydrate`] capability supplies the construction policy the factory
//! resolves at compile time.

use crate::constraint::UniqueConstraint;
use crate::event::DomainEvent;
use crate::types::AggregateId;

/// The narrow contract the repository requires of every aggregate.
///
/// An aggregate's version equals the number of events applied to it, so
/// `apply` must increment the counter exactly once per event. Events raised
/// by domain behavior are both applied and buffered as uncommitted; the
/// repository clears the buffer after a successful (or absorbed) commit.
pub trait Aggregate: Sized + Send {
    /// The event type this aggregate is sourced from.
    type Event: DomainEvent;

    /// A stable marker naming the aggregate's runtime type, attached to each
    /// commit as the `aggregate` header.
    fn aggregate_type() -> &'static str;

    /// The aggregate's identity.
    fn id(&self) -> AggregateId;

    /// The number of events applied so far.
    fn version(&self) -> u64;

    /// Applies one event to the aggregate state, advancing the version.
    fn apply(&mut self, event: &Self::Event);

    /// The events raised since the last successful commit, in order.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Drops the uncommitted buffer after a commit has been persisted.
    fn clear_uncommitted_events(&mut self);

    /// The uniqueness constraints derived from current field values.
    ///
    /// Recomputed fresh at every save; the default is unconstrained.
    fn unique_constraints(&self) -> Vec<UniqueConstraint> {
        Vec::new()
    }
}

/// How an aggregate shell is constructed during rehydration.
///
/// This is the compile-time rendition of the constructor-probing policy:
/// prefer an identity constructor, fall back to a bare constructor plus a
/// privileged identity restore, and otherwise report the type as
/// unconstructible.
pub enum AggregateConstructor<A> {
    /// The type has a constructor taking exactly the identity value.
    WithId(fn(AggregateId) -> A),
    /// The type has a no-argument constructor; the identity is set through
    /// the privileged `restore_id` entry point afterwards.
    Bare {
        /// Builds an empty shell.
        new: fn() -> A,
        /// Privileged rehydration entry point, distinct from the public
        /// behavioral API and intended only for infrastructure use.
        restore_id: fn(&mut A, AggregateId),
    },
    /// The type exposes neither constructor; building it fails with
    /// [`RepositoryError::MissingAggregateConstructor`](crate::errors::RepositoryError::MissingAggregateConstructor).
    Unconstructible,
}

/// Capability declaring how the factory may construct this aggregate type.
pub trait Rehydrate: Aggregate {
    /// The construction policy for this type.
    fn constructor() -> AggregateConstructor<Self>;
}

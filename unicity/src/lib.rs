//! `unicity` - Event-sourced aggregate repository.
//!
//! This library rehydrates aggregates from an append-only event log,
//! resolves concurrent-write conflicts under optimistic concurrency, and
//! enforces application-defined uniqueness constraints derived from
//! aggregate state, without a relational schema for identity. The durable
//! log itself is a collaborator behind the [`store::EventStore`] port;
//! `unicity-memory` ships an in-memory implementation for development and
//! tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod bridge;
pub mod conflict;
pub mod constraint;
pub mod errors;
pub mod event;
pub mod factory;
pub mod repository;
pub mod store;
pub mod types;

pub use aggregate::{Aggregate, AggregateConstructor, Rehydrate};
pub use bridge::{EventTypeBridge, NoopBridge};
pub use conflict::{ConflictDetector, DetectConflicts};
pub use constraint::{ConstraintValue, UniqueConstraint};
pub use errors::{EventStoreError, EventStoreResult, RepositoryError, RepositoryResult};
pub use event::{DomainEvent, EventMessage, AGGREGATE_TYPE_HEADER, EVENT_NAME_HEADER};
pub use factory::build_aggregate;
pub use repository::{Repository, RetryConfig, UNBOUNDED};
pub use store::{EventStore, EventStream, Snapshot};
pub use types::{AggregateId, BucketId, CommitId};

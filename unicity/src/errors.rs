//! Error types for the aggregate repository.
//!
//! Two enums cover the two layers: [`EventStoreError`] for the storage
//! abstraction, [`RepositoryError`] for the caller-facing taxonomy. Raw
//! store failures never leak to callers; the repository translates them so
//! callers depend only on this taxonomy.

use thiserror::Error;

use crate::types::{AggregateId, BucketId, CommitId};

/// Failures reported by an [`EventStore`](crate::store::EventStore)
/// implementation.
///
/// `DuplicateCommit` and `VersionConflict` are resolved inside the
/// repository's save protocol; everything else surfaces to callers wrapped
/// as [`RepositoryError::Persistence`].
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The commit id was already applied; the attempt is an idempotent
    /// retry.
    #[error("commit {0} was already applied")]
    DuplicateCommit(CommitId),

    /// Another writer committed events since this stream was prepared.
    #[error(
        "version conflict on stream '{bucket}/{id}': expected {expected}, but current is {current}"
    )]
    VersionConflict {
        /// The bucket of the conflicted stream.
        bucket: BucketId,
        /// The aggregate id of the conflicted stream.
        id: AggregateId,
        /// The committed-event count observed at preparation time.
        expected: u64,
        /// The store's current committed-event count.
        current: u64,
    },

    /// A submitted unique constraint's (name, payload) pair already exists
    /// for a different aggregate.
    #[error("unique constraint '{name}' violated")]
    UniqueViolation {
        /// The name of the violated constraint.
        name: String,
    },

    /// The requested stream does not exist.
    #[error("stream '{bucket}/{id}' not found")]
    StreamNotFound {
        /// The bucket that was searched.
        bucket: BucketId,
        /// The aggregate id that was searched.
        id: AggregateId,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other storage failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Caller-facing errors of the repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A load was requested for version 0; the version cap must be a
    /// positive count of events to replay.
    #[error("cannot load an aggregate at version 0; the version to load must be positive")]
    InvalidVersion,

    /// No committed or uncommitted events exist for the requested identity.
    #[error("aggregate {id} of type '{aggregate_type}' was not found")]
    AggregateNotFound {
        /// The identity that was requested.
        id: AggregateId,
        /// The aggregate type that was requested.
        aggregate_type: &'static str,
    },

    /// The aggregate type declares no usable constructor. Non-retryable;
    /// indicates a programming error.
    #[error(
        "no usable constructor for aggregate type '{aggregate_type}': \
         declare an identity constructor or a bare constructor with restore_id"
    )]
    MissingAggregateConstructor {
        /// The aggregate type that could not be built.
        aggregate_type: &'static str,
    },

    /// Concurrently committed events are incompatible with the uncommitted
    /// changes. Reload and retry at the application level.
    #[error("conflicting command: concurrent events are incompatible with the uncommitted changes")]
    ConflictingCommand,

    /// The bounded save-retry loop ran out of attempts under sustained
    /// contention.
    #[error("save abandoned after {attempts} conflicted attempts")]
    RetriesExhausted {
        /// How many commit attempts were made.
        attempts: u32,
    },

    /// Any store failure other than duplicate-commit or version-conflict,
    /// including uniqueness violations. The wrapped message preserves the
    /// store's detail so callers can distinguish constraint violations.
    #[error("persistence failure: {message}")]
    Persistence {
        /// The underlying store's message.
        message: String,
        /// The store failure that caused this error.
        #[source]
        source: EventStoreError,
    },
}

impl RepositoryError {
    /// Whether this error wraps a unique-constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Persistence {
                source: EventStoreError::UniqueViolation { .. },
                ..
            }
        )
    }
}

/// Type alias for event store results.
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Type alias for repository results.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_message_names_the_constraint() {
        let err = EventStoreError::UniqueViolation {
            name: "number".to_string(),
        };
        assert_eq!(err.to_string(), "unique constraint 'number' violated");
    }

    #[test]
    fn version_conflict_message_is_descriptive() {
        let err = EventStoreError::VersionConflict {
            bucket: BucketId::default(),
            id: AggregateId::generate(),
            expected: 2,
            current: 3,
        };
        let text = err.to_string();
        assert!(text.contains("expected 2"));
        assert!(text.contains("current is 3"));
    }

    #[test]
    fn persistence_preserves_the_unique_violation_marker() {
        let source = EventStoreError::UniqueViolation {
            name: "number".to_string(),
        };
        let err = RepositoryError::Persistence {
            message: source.to_string(),
            source,
        };

        assert!(err.is_unique_violation());
        assert!(err.to_string().contains("unique constraint 'number'"));
    }

    #[test]
    fn other_persistence_failures_are_not_unique_violations() {
        let source = EventStoreError::Storage("disk full".to_string());
        let err = RepositoryError::Persistence {
            message: source.to_string(),
            source,
        };

        assert!(!err.is_unique_violation());
    }
}

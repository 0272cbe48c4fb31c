//! In-memory event store for the `unicity` aggregate repository.
//!
//! This crate provides an in-memory implementation of the `EventStore`
//! trait, useful for testing and development scenarios where persistence is
//! not required. It honors the full store contract: optimistic concurrency
//! with stream refresh on conflict, duplicate-commit absorption, atomic
//! unique-constraint enforcement, and snapshots.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use unicity::errors::{EventStoreError, EventStoreResult};
use unicity::event::{DomainEvent, EventMessage};
use unicity::store::{EventStore, EventStream, Snapshot};
use unicity::types::{AggregateId, BucketId, CommitId};
use unicity::UniqueConstraint;

type StreamKey = (BucketId, AggregateId);
/// (bucket, constraint name, payload) -> owning aggregate.
type ConstraintKey = (BucketId, String, String);
/// (bucket, aggregate, constraint name) -> registered payload.
type OwnerKey = (BucketId, AggregateId, String);

struct Inner<E> {
    /// All committed events per stream, versions 1..=len.
    streams: HashMap<StreamKey, Vec<EventMessage<E>>>,
    /// Commit ids already applied, for duplicate detection.
    commits: HashSet<CommitId>,
    /// Active unique-constraint registrations.
    constraints: HashMap<ConstraintKey, AggregateId>,
    /// Which payload each aggregate currently holds per constraint name,
    /// so a re-save releases its stale registration.
    owned: HashMap<OwnerKey, String>,
    /// Snapshots per stream, sorted by version.
    snapshots: HashMap<StreamKey, Vec<Snapshot>>,
}

impl<E> Inner<E> {
    fn new() -> Self {
        Self {
            streams: HashMap::new(),
            commits: HashSet::new(),
            constraints: HashMap::new(),
            owned: HashMap::new(),
            snapshots: HashMap::new(),
        }
    }
}

/// Thread-safe in-memory event store for testing.
///
/// Cloning is cheap and shares storage, so several repositories (and
/// therefore several concurrent writers) can race against the same state.
pub struct InMemoryEventStore<E> {
    inner: Arc<RwLock<Inner<E>>>,
}

impl<E> Clone for InMemoryEventStore<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> InMemoryEventStore<E> {
    /// Create a new empty in-memory event store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::new())),
        }
    }
}

impl<E> Default for InMemoryEventStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn slice_between<E: Clone>(events: &[EventMessage<E>], min: u64, max: u64) -> Vec<EventMessage<E>> {
    // Event n (1-based) has version n; take versions in (min, max].
    events
        .iter()
        .enumerate()
        .filter(|(index, _)| {
            let version = *index as u64 + 1;
            version > min && version <= max
        })
        .map(|(_, event)| event.clone())
        .collect()
}

#[async_trait]
impl<E> EventStore for InMemoryEventStore<E>
where
    E: DomainEvent + 'static,
{
    type Event = E;

    async fn create_stream(
        &self,
        bucket: &BucketId,
        id: AggregateId,
    ) -> EventStoreResult<EventStream<Self::Event>> {
        Ok(EventStream::new(bucket.clone(), id, 0, Vec::new()))
    }

    async fn open_stream(
        &self,
        bucket: &BucketId,
        id: AggregateId,
        min_version: u64,
        max_version: u64,
    ) -> EventStoreResult<EventStream<Self::Event>> {
        let inner = self.inner.read().expect("RwLock poisoned");

        let committed = inner
            .streams
            .get(&(bucket.clone(), id))
            .map(|events| slice_between(events, min_version, max_version))
            .unwrap_or_default();

        Ok(EventStream::new(bucket.clone(), id, min_version, committed))
    }

    async fn open_stream_at(
        &self,
        snapshot: &Snapshot,
        max_version: u64,
    ) -> EventStoreResult<EventStream<Self::Event>> {
        self.open_stream(&snapshot.bucket, snapshot.id, snapshot.version, max_version)
            .await
    }

    async fn get_snapshot(
        &self,
        bucket: &BucketId,
        id: AggregateId,
        max_version: u64,
    ) -> EventStoreResult<Option<Snapshot>> {
        let inner = self.inner.read().expect("RwLock poisoned");

        Ok(inner
            .snapshots
            .get(&(bucket.clone(), id))
            .and_then(|snapshots| {
                snapshots
                    .iter()
                    .filter(|s| s.version <= max_version)
                    .max_by_key(|s| s.version)
                    .cloned()
            }))
    }

    async fn add_snapshot(&self, snapshot: Snapshot) -> EventStoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");

        let entries = inner
            .snapshots
            .entry((snapshot.bucket.clone(), snapshot.id))
            .or_default();
        entries.push(snapshot);
        entries.sort_by_key(|s| s.version);

        Ok(())
    }

    async fn commit(
        &self,
        stream: &mut EventStream<Self::Event>,
        commit_id: CommitId,
        constraints: &[UniqueConstraint],
    ) -> EventStoreResult<()> {
        let mut inner = self.inner.write().expect("RwLock poisoned");

        if inner.commits.contains(&commit_id) {
            return Err(EventStoreError::DuplicateCommit(commit_id));
        }

        let bucket = stream.bucket().clone();
        let id = stream.id();
        let key = (bucket.clone(), id);

        let persisted = inner.streams.get(&key).map_or(0, |events| events.len() as u64);
        if persisted != stream.revision() {
            let expected = stream.revision();
            let tail = inner
                .streams
                .get(&key)
                .and_then(|events| events.get(expected as usize..))
                .map(<[EventMessage<E>]>::to_vec)
                .unwrap_or_default();
            stream.refresh(tail);

            return Err(EventStoreError::VersionConflict {
                bucket,
                id,
                expected,
                current: persisted,
            });
        }

        // Validate every constraint before touching any state; a violation
        // must leave nothing behind.
        for constraint in constraints {
            let ckey = (
                bucket.clone(),
                constraint.name().to_owned(),
                constraint.payload().to_owned(),
            );
            if let Some(owner) = inner.constraints.get(&ckey) {
                if *owner != id {
                    return Err(EventStoreError::UniqueViolation {
                        name: constraint.name().to_owned(),
                    });
                }
            }
        }

        for constraint in constraints {
            let okey = (bucket.clone(), id, constraint.name().to_owned());
            if let Some(stale_payload) = inner
                .owned
                .insert(okey, constraint.payload().to_owned())
            {
                if stale_payload != constraint.payload() {
                    inner.constraints.remove(&(
                        bucket.clone(),
                        constraint.name().to_owned(),
                        stale_payload,
                    ));
                }
            }
            inner.constraints.insert(
                (
                    bucket.clone(),
                    constraint.name().to_owned(),
                    constraint.payload().to_owned(),
                ),
                id,
            );
        }

        // Absorb first so the commit headers are stamped onto the events,
        // then persist exactly what the stream's committed view gained.
        let absorbed_from = stream.committed_events().len();
        stream.apply_commit();
        let appended: Vec<EventMessage<E>> = stream.committed_events()[absorbed_from..].to_vec();
        inner.streams.entry(key).or_default().extend(appended);
        inner.commits.insert(commit_id);

        Ok(())
    }
}

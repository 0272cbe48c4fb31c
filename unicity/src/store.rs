//! The event store abstraction.
//!
//! This module defines the port interface the repository consumes: streams,
//! snapshots, and the [`EventStore`] trait. The durable log itself (its
//! dialects, serialization, transactions) lives behind this interface and is
//! out of scope for this crate.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constraint::UniqueConstraint;
use crate::errors::EventStoreResult;
use crate::event::{DomainEvent, EventMessage};
use crate::types::{AggregateId, BucketId, CommitId};

/// A point-in-time compacted representation of aggregate state at a known
/// version. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The bucket the snapshotted stream lives in.
    pub bucket: BucketId,
    /// The snapshotted aggregate's identity.
    pub id: AggregateId,
    /// The stream version this snapshot was taken at.
    pub version: u64,
    /// The opaque state memento.
    pub memento: serde_json::Value,
}

impl Snapshot {
    /// Creates a snapshot.
    pub const fn new(
        bucket: BucketId,
        id: AggregateId,
        version: u64,
        memento: serde_json::Value,
    ) -> Self {
        Self {
            bucket,
            id,
            version,
            memento,
        }
    }
}

/// One aggregate's event stream as seen by a repository session.
///
/// Committed events are append-only and never reordered. Pending events and
/// headers are mutable until a commit attempt succeeds or is abandoned, at
/// which point they are cleared. The stream's revision (the committed-event
/// count observed so far) stamps each commit attempt for optimistic
/// concurrency control.
#[derive(Debug, Clone)]
pub struct EventStream<E> {
    bucket: BucketId,
    id: AggregateId,
    /// Version the committed view starts after (non-zero for
    /// snapshot-anchored streams).
    base_version: u64,
    committed: Vec<EventMessage<E>>,
    uncommitted: Vec<EventMessage<E>>,
    uncommitted_headers: HashMap<String, String>,
}

impl<E> EventStream<E> {
    /// Creates a stream view.
    ///
    /// `base_version` is 0 for streams read from scratch, or the snapshot
    /// version for snapshot-anchored streams; `committed` holds the events
    /// after that point.
    pub fn new(
        bucket: BucketId,
        id: AggregateId,
        base_version: u64,
        committed: Vec<EventMessage<E>>,
    ) -> Self {
        Self {
            bucket,
            id,
            base_version,
            committed,
            uncommitted: Vec::new(),
            uncommitted_headers: HashMap::new(),
        }
    }

    /// The bucket this stream belongs to.
    pub fn bucket(&self) -> &BucketId {
        &self.bucket
    }

    /// The aggregate this stream belongs to.
    pub fn id(&self) -> AggregateId {
        self.id
    }

    /// The stream version this view has observed: the anchor version plus
    /// every committed event seen.
    pub fn revision(&self) -> u64 {
        self.base_version + self.committed.len() as u64
    }

    /// The committed events visible to this view, in stream order.
    pub fn committed_events(&self) -> &[EventMessage<E>] {
        &self.committed
    }

    /// The pending events of the current commit attempt.
    pub fn uncommitted_events(&self) -> &[EventMessage<E>] {
        &self.uncommitted
    }

    /// The pending commit headers.
    pub fn uncommitted_headers(&self) -> &HashMap<String, String> {
        &self.uncommitted_headers
    }

    /// Adds a pending event to the current commit attempt.
    pub fn add(&mut self, message: EventMessage<E>) {
        self.uncommitted.push(message);
    }

    /// Sets a pending commit header, replacing any existing value.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.uncommitted_headers.insert(key.into(), value.into());
    }

    /// Discards all pending events and headers.
    pub fn clear_changes(&mut self) {
        self.uncommitted.clear();
        self.uncommitted_headers.clear();
    }

    /// Store-side hook: absorbs the pending events into the committed view
    /// after a successful commit.
    ///
    /// Each absorbed event is stamped with the pending commit headers;
    /// headers already present on an event (such as an event-type alias)
    /// take precedence.
    pub fn apply_commit(&mut self) {
        for message in &mut self.uncommitted {
            for (key, value) in &self.uncommitted_headers {
                message
                    .headers
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        self.committed.append(&mut self.uncommitted);
        self.uncommitted_headers.clear();
    }

    /// Store-side hook: appends events another writer committed, bringing
    /// the view up to the store's current state after a version conflict.
    pub fn refresh(&mut self, newly_committed: Vec<EventMessage<E>>) {
        self.committed.extend(newly_committed);
    }
}

/// The port interface a backing event store must satisfy.
///
/// Implementations own durability, atomicity, and uniqueness enforcement.
/// The repository drives them through this narrow surface only.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// The event type this store handles.
    type Event: DomainEvent;

    /// Creates an empty stream view for a (bucket, id) pair, anchored at
    /// version 0. Used when saving without a prior load; committing it over
    /// an existing stream reports a version conflict.
    async fn create_stream(
        &self,
        bucket: &BucketId,
        id: AggregateId,
    ) -> EventStoreResult<EventStream<Self::Event>>;

    /// Opens a stream with committed events in `(min_version, max_version]`.
    /// A stream with no events opens empty rather than failing.
    async fn open_stream(
        &self,
        bucket: &BucketId,
        id: AggregateId,
        min_version: u64,
        max_version: u64,
    ) -> EventStoreResult<EventStream<Self::Event>>;

    /// Opens a stream anchored at a snapshot: committed events strictly
    /// after the snapshot version, up to `max_version`.
    async fn open_stream_at(
        &self,
        snapshot: &Snapshot,
        max_version: u64,
    ) -> EventStoreResult<EventStream<Self::Event>>;

    /// Fetches the most recent snapshot with version at most `max_version`,
    /// if any.
    async fn get_snapshot(
        &self,
        bucket: &BucketId,
        id: AggregateId,
        max_version: u64,
    ) -> EventStoreResult<Option<Snapshot>>;

    /// Stores a snapshot.
    async fn add_snapshot(&self, snapshot: Snapshot) -> EventStoreResult<()>;

    /// Atomically appends the stream's pending events and headers and
    /// validates the submitted uniqueness constraints, tagged with
    /// `commit_id`.
    ///
    /// On success the implementation absorbs the pending events into the
    /// stream's committed view. On a version conflict it must refresh the
    /// stream's committed view to the store's current state before
    /// returning the error; the repository's conflict comparison and retry
    /// re-preparation depend on that. A recognized `commit_id` fails with
    /// [`EventStoreError::DuplicateCommit`](crate::errors::EventStoreError::DuplicateCommit)
    /// without touching state. A violated constraint fails with
    /// [`EventStoreError::UniqueViolation`](crate::errors::EventStoreError::UniqueViolation)
    /// and no partial state change may be observable.
    async fn commit(
        &self,
        stream: &mut EventStream<Self::Event>,
        commit_id: CommitId,
        constraints: &[UniqueConstraint],
    ) -> EventStoreResult<()>;
}

//! The unit-of-work repository.
//!
//! A [`Repository`] is a short-lived, single-threaded session over an event
//! store: it caches streams and snapshots per (bucket, id), rehydrates
//! aggregates by bounded replay, and drives the commit-retry protocol on
//! save. Correctness under concurrent writers comes solely from the store's
//! atomic version-checked commit plus conflict detection; the repository
//! never locks.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::aggregate::{Aggregate, Rehydrate};
use crate::bridge::EventTypeBridge;
use crate::conflict::DetectConflicts;
use crate::errors::{EventStoreError, RepositoryError, RepositoryResult};
use crate::event::{EventMessage, AGGREGATE_TYPE_HEADER, EVENT_NAME_HEADER};
use crate::factory::build_aggregate;
use crate::store::{EventStore, EventStream, Snapshot};
use crate::types::{AggregateId, BucketId, CommitId};

/// Replay cap meaning "replay everything".
pub const UNBOUNDED: u64 = u64::MAX;

/// Configuration for the bounded save-retry loop.
///
/// A save that keeps losing the optimistic-concurrency race re-prepares and
/// retries with exponential backoff and jitter, up to `max_attempts` commit
/// attempts, then fails with
/// [`RepositoryError::RetriesExhausted`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of commit attempts.
    pub max_attempts: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base_delay: Duration::from_millis(25),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculates the backoff delay before retry number `attempt` (1-based).
    ///
    /// Exponential with ±25% jitter, capped at `max_delay`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn delay_for(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;

        let delay = base_ms * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = delay.min(max_ms);

        let mut rng = rand::rng();
        let jitter = delay * 0.25 * (rng.random::<f64>() - 0.5) * 2.0;
        let final_ms = (delay + jitter).clamp(0.0, max_ms) as u64;

        Duration::from_millis(final_ms)
    }
}

type StreamKey = (BucketId, AggregateId);

/// Event-sourced aggregate repository over an [`EventStore`].
///
/// One instance is one unit of work: its stream and snapshot caches assume
/// sequential access, so it must not be shared between concurrent callers.
/// Multiple independent repositories over the same store are the normal
/// case and are how conflicts arise and get detected. Dropping the
/// repository releases every cached stream.
pub struct Repository<S: EventStore> {
    store: S,
    conflict_detector: Arc<dyn DetectConflicts<S::Event>>,
    bridge: Arc<dyn EventTypeBridge<S::Event>>,
    retry: RetryConfig,
    streams: HashMap<StreamKey, EventStream<S::Event>>,
    snapshots: HashMap<StreamKey, Option<Snapshot>>,
}

impl<S: EventStore> Repository<S> {
    /// Creates a repository over a store with its collaborators.
    pub fn new(
        store: S,
        conflict_detector: impl DetectConflicts<S::Event> + 'static,
        bridge: impl EventTypeBridge<S::Event> + 'static,
    ) -> Self {
        Self {
            store,
            conflict_detector: Arc::new(conflict_detector),
            bridge: Arc::new(bridge),
            retry: RetryConfig::default(),
            streams: HashMap::new(),
            snapshots: HashMap::new(),
        }
    }

    /// Replaces the retry configuration.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Loads an aggregate by replaying its full committed history.
    pub async fn get_latest<A>(&mut self, bucket: &BucketId, id: AggregateId) -> RepositoryResult<A>
    where
        A: Rehydrate + Aggregate<Event = S::Event>,
    {
        self.get_by_id(bucket, id, UNBOUNDED).await
    }

    /// Loads an aggregate, replaying at most `version_to_load` committed
    /// events.
    ///
    /// `version_to_load` must be positive ([`UNBOUNDED`] replays
    /// everything); 0 fails with [`RepositoryError::InvalidVersion`]. Fails
    /// with [`RepositoryError::AggregateNotFound`] when the stream has no
    /// committed and no uncommitted events.
    #[instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn get_by_id<A>(
        &mut self,
        bucket: &BucketId,
        id: AggregateId,
        version_to_load: u64,
    ) -> RepositoryResult<A>
    where
        A: Rehydrate + Aggregate<Event = S::Event>,
    {
        if version_to_load == 0 {
            return Err(RepositoryError::InvalidVersion);
        }

        let snapshot = self.snapshot_for(bucket, id, version_to_load).await?;

        let key = (bucket.clone(), id);
        let stream = match self.streams.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let opened = match &snapshot {
                    Some(anchor) => self.store.open_stream_at(anchor, version_to_load).await,
                    None => self.store.open_stream(bucket, id, 0, version_to_load).await,
                };
                match opened {
                    Ok(stream) => entry.insert(stream),
                    Err(EventStoreError::StreamNotFound { .. }) => {
                        return Err(RepositoryError::AggregateNotFound {
                            id,
                            aggregate_type: A::aggregate_type(),
                        })
                    }
                    Err(err) => return Err(persistence(err)),
                }
            }
        };

        let mut aggregate: A = build_aggregate(id, snapshot.as_ref().map(|s| &s.memento))?;

        if stream.committed_events().is_empty() && stream.uncommitted_events().is_empty() {
            return Err(RepositoryError::AggregateNotFound {
                id,
                aggregate_type: A::aggregate_type(),
            });
        }

        if aggregate.version() < version_to_load {
            for message in stream.committed_events() {
                let body = message.body.clone();
                let event = match message.header(EVENT_NAME_HEADER) {
                    Some(alias) => self.bridge.translate(body, alias),
                    None => body,
                };
                aggregate.apply(&event);

                if aggregate.version() >= version_to_load {
                    break;
                }
            }
        }

        debug!(
            version = aggregate.version(),
            "rehydrated aggregate from stream"
        );

        Ok(aggregate)
    }

    /// Saves the aggregate's uncommitted events as one commit.
    ///
    /// Equivalent to [`Repository::save_with_headers`] with no extra
    /// headers.
    pub async fn save<A>(
        &mut self,
        bucket: &BucketId,
        aggregate: &mut A,
        commit_id: CommitId,
    ) -> RepositoryResult<()>
    where
        A: Aggregate<Event = S::Event>,
    {
        self.save_with_headers(bucket, aggregate, commit_id, |_| {})
            .await
    }

    /// Saves the aggregate's uncommitted events as one commit, letting
    /// `update_headers` add or overwrite commit metadata.
    ///
    /// The headers always start with the `aggregate` header naming the
    /// aggregate's runtime type. Runs the bounded commit-retry protocol: a
    /// duplicate commit is absorbed as success, a version conflict is
    /// either retried (compatible concurrent events) or surfaced as
    /// [`RepositoryError::ConflictingCommand`], and any other store failure
    /// becomes [`RepositoryError::Persistence`]. On success the aggregate's
    /// uncommitted buffer is cleared.
    #[instrument(skip(self, aggregate, update_headers), fields(
        aggregate_type = A::aggregate_type(),
        id = %aggregate.id(),
    ))]
    pub async fn save_with_headers<A, F>(
        &mut self,
        bucket: &BucketId,
        aggregate: &mut A,
        commit_id: CommitId,
        update_headers: F,
    ) -> RepositoryResult<()>
    where
        A: Aggregate<Event = S::Event>,
        F: FnOnce(&mut HashMap<String, String>),
    {
        let mut headers = HashMap::new();
        headers.insert(
            AGGREGATE_TYPE_HEADER.to_owned(),
            A::aggregate_type().to_owned(),
        );
        update_headers(&mut headers);

        let mut attempts = 0u32;
        loop {
            attempts += 1;

            let key = (bucket.clone(), aggregate.id());
            let stream = match self.streams.entry(key) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let created = self
                        .store
                        .create_stream(bucket, aggregate.id())
                        .await
                        .map_err(persistence)?;
                    entry.insert(created)
                }
            };

            for (name, value) in &headers {
                stream.set_header(name.clone(), value.clone());
            }

            for event in aggregate.uncommitted_events() {
                let mut message = EventMessage::new(event.clone());
                if let Some(alias) = self.bridge.resolve_event_name(event) {
                    message = message.with_header(EVENT_NAME_HEADER, alias);
                }
                stream.add(message);
            }

            let commit_event_count = stream.committed_events().len();
            let constraints = aggregate.unique_constraints();

            match self.store.commit(stream, commit_id, &constraints).await {
                Ok(()) => {
                    aggregate.clear_uncommitted_events();
                    return Ok(());
                }
                Err(EventStoreError::DuplicateCommit(_)) => {
                    // This commit already succeeded; the attempt is an
                    // idempotent retry, not an error.
                    debug!("commit id already applied; treating save as successful");
                    stream.clear_changes();
                    return Ok(());
                }
                Err(EventStoreError::VersionConflict { current, .. }) => {
                    let uncommitted: Vec<S::Event> = stream
                        .uncommitted_events()
                        .iter()
                        .map(|m| m.body.clone())
                        .collect();
                    let newly_committed: Vec<S::Event> = stream
                        .committed_events()
                        .get(commit_event_count..)
                        .unwrap_or(&[])
                        .iter()
                        .map(|m| m.body.clone())
                        .collect();

                    let conflicting = self
                        .conflict_detector
                        .conflicts_with(&uncommitted, &newly_committed);
                    stream.clear_changes();

                    if conflicting {
                        warn!(current, "concurrent events are incompatible; giving up");
                        return Err(RepositoryError::ConflictingCommand);
                    }

                    if attempts >= self.retry.max_attempts {
                        warn!(attempts, "retry budget exhausted under contention");
                        return Err(RepositoryError::RetriesExhausted { attempts });
                    }

                    debug!(
                        attempts,
                        current, "compatible concurrent events; re-preparing and retrying"
                    );
                    tokio::time::sleep(self.retry.delay_for(attempts)).await;
                }
                Err(err) => return Err(persistence(err)),
            }
        }
    }

    /// Clears the session caches, releasing every cached stream and
    /// snapshot. Dropping the repository has the same effect.
    pub fn clear(&mut self) {
        self.streams.clear();
        self.snapshots.clear();
    }

    /// Fetches (or reuses the session-cached) snapshot for a stream. A
    /// missing snapshot is cached too, so one load sequence hits the store
    /// at most once.
    async fn snapshot_for(
        &mut self,
        bucket: &BucketId,
        id: AggregateId,
        max_version: u64,
    ) -> RepositoryResult<Option<Snapshot>> {
        let key = (bucket.clone(), id);
        if let Some(cached) = self.snapshots.get(&key) {
            return Ok(cached.clone());
        }

        let snapshot = self
            .store
            .get_snapshot(bucket, id, max_version)
            .await
            .map_err(persistence)?;
        self.snapshots.insert(key, snapshot.clone());

        Ok(snapshot)
    }
}

/// Translates a store failure into the caller-facing taxonomy, preserving
/// the store's message.
fn persistence(err: EventStoreError) -> RepositoryError {
    RepositoryError::Persistence {
        message: err.to_string(),
        source: err,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_config_is_bounded() {
        let config = RetryConfig::default();
        assert!(config.max_attempts > 1);
        assert!(config.base_delay < config.max_delay);
    }

    #[test]
    fn delay_never_exceeds_the_cap() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(400),
            backoff_multiplier: 3.0,
        };

        for attempt in 1..=10 {
            assert!(config.delay_for(attempt) <= config.max_delay);
        }
    }

    #[test]
    fn delay_grows_with_attempts_before_the_cap() {
        let config = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        };

        // Jitter is ±25%, so attempt 3 (400ms nominal) always exceeds
        // attempt 1 (100ms nominal).
        let first = config.delay_for(1);
        let third = config.delay_for(3);
        assert!(third > first);
    }
}

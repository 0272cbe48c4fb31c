//! Core identifier types for the `unicity` aggregate repository.
//!
//! All identifiers use smart constructors so that a value, once built, is
//! always valid. This follows the "parse, don't validate" principle.

use nutype::nutype;
use uuid::Uuid;

/// A bucket identifier partitioning the event store into independent
/// namespaces.
///
/// The same aggregate id can exist in several buckets without interfering.
/// `BucketId` values are guaranteed to be non-empty and at most 255
/// characters.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct BucketId(String);

impl Default for BucketId {
    /// The conventional default bucket, named `default`.
    fn default() -> Self {
        // "default" is non-empty and short, so this always succeeds
        Self::try_new("default").expect("\"default\" is always a valid bucket id")
    }
}

/// The identity of an aggregate.
///
/// Aggregate ids are plain UUIDs; unlike commit ids they carry no ordering
/// requirement, so any UUID version is accepted.
#[nutype(derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsRef,
    Deref,
    Display,
    Serialize,
    Deserialize
))]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Generates a fresh aggregate id.
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }
}

/// An idempotency token identifying one commit attempt.
///
/// Saving twice with the same `CommitId` is absorbed by the store as a
/// duplicate commit, so callers can retry a save without producing duplicate
/// events. Commit ids are `UUIDv7` for monotonic sort order.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct CommitId(Uuid);

impl CommitId {
    /// Creates a new `CommitId` with the current timestamp.
    pub fn new() -> Self {
        // This will always succeed as Uuid::now_v7() always returns a valid v7 UUID
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for CommitId {
    fn default() -> Self {
        Self::new()
    }
}

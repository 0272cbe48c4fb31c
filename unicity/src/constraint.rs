//! Unique-constraint derivation.
//!
//! A [`UniqueConstraint`] is a `(name, payload)` pair derived from aggregate
//! field values. The backing store enforces global uniqueness per pair
//! atomically with an event append. Payloads are pure functions of the field
//! values they cover: identical values always produce identical payloads, so
//! the store can compare them across aggregates without seeing raw values.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload sentinel for absent values.
const NULL_PAYLOAD: &str = "{null}";

/// Separator joining child constraint names in a composite constraint.
const NAME_SEPARATOR: &str = "-";

/// A field value participating in a unique constraint.
///
/// Conversions are provided for the common field types; everything else can
/// go through [`ConstraintValue::other`] with its display form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintValue {
    /// An absent value.
    Null,
    /// A string, compared case-insensitively.
    Text(String),
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A UUID, e.g. a reference to another aggregate.
    Uuid(Uuid),
    /// A point in time.
    DateTime(DateTime<Utc>),
    /// A span of time.
    Duration(Duration),
    /// Any other value, captured as its display form.
    Other(String),
}

impl ConstraintValue {
    /// Wraps an arbitrary displayable value.
    pub fn other(value: impl ToString) -> Self {
        Self::Other(value.to_string())
    }

    /// Derives the deterministic payload for this value.
    ///
    /// Strings are lowercased before hashing so uniqueness is
    /// case-insensitive; the hash keeps raw values out of the store's
    /// constraint index. Date/time values use their microsecond offset as a
    /// decimal string. Everything else uses its lowercased display form.
    fn payload(&self) -> String {
        match self {
            Self::Null => NULL_PAYLOAD.to_owned(),
            Self::Text(s) => blake3::hash(s.to_lowercase().as_bytes())
                .to_hex()
                .to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Uuid(u) => u.to_string(),
            Self::DateTime(dt) => dt.timestamp_micros().to_string(),
            Self::Duration(d) => d
                .num_microseconds()
                .unwrap_or_else(|| d.num_milliseconds().saturating_mul(1000))
                .to_string(),
            Self::Other(s) => s.to_lowercase(),
        }
    }
}

impl From<&str> for ConstraintValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ConstraintValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for ConstraintValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConstraintValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Uuid> for ConstraintValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for ConstraintValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<Duration> for ConstraintValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

impl<T> From<Option<T>> for ConstraintValue
where
    T: Into<ConstraintValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A derived uniqueness constraint.
///
/// Two constraints are semantically equal iff their names and payloads match
/// exactly. Constraints are recomputed from aggregate state at save time and
/// submitted alongside the commit; they are never stored independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniqueConstraint {
    name: String,
    payload: String,
}

impl UniqueConstraint {
    /// Builds a single-field constraint.
    ///
    /// The field name is lowercased so `"Number"` and `"number"` identify the
    /// same constraint.
    pub fn field(name: &str, value: impl Into<ConstraintValue>) -> Self {
        Self {
            name: name.to_lowercase(),
            payload: value.into().payload(),
        }
    }

    /// Builds a composite constraint over an ordered list of children.
    ///
    /// The name joins the child names in input order, so field order is part
    /// of the constraint's identity. Each child payload is bracket-delimited
    /// to keep concatenation unambiguous when payload lengths vary.
    pub fn composite(parts: impl IntoIterator<Item = Self>) -> Self {
        let mut names = Vec::new();
        let mut payload = String::new();
        for part in parts {
            names.push(part.name);
            payload.push('{');
            payload.push_str(&part.payload);
            payload.push('}');
        }

        Self {
            name: names.join(NAME_SEPARATOR),
            payload,
        }
    }

    /// The stable identifier of the constrained field set.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The deterministic payload derived from the covered field values.
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

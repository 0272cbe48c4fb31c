//! Event messages and the domain-event contract.
//!
//! An [`EventMessage`] is the unit appended to a stream: an opaque event body
//! plus string headers carrying commit metadata such as the aggregate-type
//! marker or an event-type alias.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Header key carrying the runtime type of the aggregate that produced a
/// commit.
pub const AGGREGATE_TYPE_HEADER: &str = "aggregate";

/// Header key carrying a stable event-type alias resolved by an
/// [`EventTypeBridge`](crate::bridge::EventTypeBridge).
pub const EVENT_NAME_HEADER: &str = "eventType";

/// The contract every domain event type must satisfy.
///
/// The `kind` tag identifies the variant of an event for conflict-rule lookup
/// and replay dispatch. Tags must be stable: they are the identity of an
/// event kind across concurrently produced change sets.
pub trait DomainEvent: Clone + Send + Sync {
    /// A stable tag naming this event's kind, e.g. `"account.renamed"`.
    fn kind(&self) -> &'static str;
}

/// An event body together with its headers.
///
/// Immutable once committed; headers are only populated while the message is
/// pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage<E> {
    /// The event payload.
    pub body: E,
    /// String metadata attached to this event.
    pub headers: HashMap<String, String>,
}

impl<E> EventMessage<E> {
    /// Creates a message with no headers.
    pub fn new(body: E) -> Self {
        Self {
            body,
            headers: HashMap::new(),
        }
    }

    /// Attaches a header, replacing any existing value for the key.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Looks up a header value by key.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Ping;

    impl DomainEvent for Ping {
        fn kind(&self) -> &'static str {
            "ping"
        }
    }

    #[test]
    fn message_headers_roundtrip() {
        let message = EventMessage::new(Ping)
            .with_header(EVENT_NAME_HEADER, "ping.v1")
            .with_header("causation", "abc");

        assert_eq!(message.header(EVENT_NAME_HEADER), Some("ping.v1"));
        assert_eq!(message.header("causation"), Some("abc"));
        assert_eq!(message.header("missing"), None);
    }

    #[test]
    fn with_header_overwrites_existing_value() {
        let message = EventMessage::new(Ping)
            .with_header(EVENT_NAME_HEADER, "ping.v1")
            .with_header(EVENT_NAME_HEADER, "ping.v2");

        assert_eq!(message.header(EVENT_NAME_HEADER), Some("ping.v2"));
    }
}

//! Event-type aliasing between the domain and the stored stream.
//!
//! A bridge lets event representations evolve without breaking old streams:
//! at commit time it resolves a stable alias header for an event, and during
//! replay it translates a stored body tagged with an alias back into the
//! current representation.

/// Optional collaborator mapping events to and from stable type aliases.
pub trait EventTypeBridge<E>: Send + Sync {
    /// Resolves the stable alias for an event about to be committed, or
    /// `None` when the event needs no alias header.
    fn resolve_event_name(&self, event: &E) -> Option<String>;

    /// Translates a stored event body tagged with `alias` into the current
    /// representation. Called during replay only when the alias header is
    /// present.
    fn translate(&self, stored: E, alias: &str) -> E;
}

/// Bridge that aliases nothing; events round-trip unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBridge;

impl<E> EventTypeBridge<E> for NoopBridge {
    fn resolve_event_name(&self, _event: &E) -> Option<String> {
        None
    }

    fn translate(&self, stored: E, _alias: &str) -> E {
        stored
    }
}

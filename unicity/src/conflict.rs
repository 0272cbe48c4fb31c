//! Conflict detection between concurrently produced event sets.
//!
//! When a save hits a version conflict, the repository asks a
//! [`DetectConflicts`] implementation whether the uncommitted events are
//! semantically compatible with the events another writer committed in the
//! meantime. The default [`ConflictDetector`] is strictly conservative: a
//! pair of event kinds with no registered rule is always a conflict.

use std::collections::HashMap;

use crate::event::DomainEvent;

/// Decision function over two ordered event sequences.
pub trait DetectConflicts<E>: Send + Sync {
    /// Returns `true` when the two change sets cannot both be retained.
    fn conflicts_with(&self, uncommitted: &[E], committed: &[E]) -> bool;
}

type ConflictRule<E> = Box<dyn Fn(&E, &E) -> bool + Send + Sync>;

/// Rule-table conflict detector keyed by `(kind, kind)` pairs.
///
/// Every ordered pair of one uncommitted and one committed event is checked
/// against the rule registered for its kind combination. A pair conflicts if
/// its rule says so, or if no rule is registered at all; only pairs whose
/// rule returns `false` are compatible. Unknown combinations are never
/// interpreted as permission to merge.
pub struct ConflictDetector<E> {
    rules: HashMap<(&'static str, &'static str), ConflictRule<E>>,
}

impl<E: DomainEvent> ConflictDetector<E> {
    /// Creates a detector with no rules; every pair conflicts.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Registers a rule for an `(uncommitted kind, committed kind)` pair.
    ///
    /// The rule returns whether the two event values conflict.
    pub fn register<F>(&mut self, uncommitted_kind: &'static str, committed_kind: &'static str, rule: F)
    where
        F: Fn(&E, &E) -> bool + Send + Sync + 'static,
    {
        self.rules
            .insert((uncommitted_kind, committed_kind), Box::new(rule));
    }

    /// Marks a kind pair as always compatible.
    pub fn register_compatible(
        &mut self,
        uncommitted_kind: &'static str,
        committed_kind: &'static str,
    ) {
        self.register(uncommitted_kind, committed_kind, |_, _| false);
    }
}

impl<E: DomainEvent> Default for ConflictDetector<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DomainEvent> DetectConflicts<E> for ConflictDetector<E> {
    fn conflicts_with(&self, uncommitted: &[E], committed: &[E]) -> bool {
        for ours in uncommitted {
            for theirs in committed {
                match self.rules.get(&(ours.kind(), theirs.kind())) {
                    Some(rule) => {
                        if rule(ours, theirs) {
                            return true;
                        }
                    }
                    // No rule registered: fail closed.
                    None => return true,
                }
            }
        }

        false
    }
}

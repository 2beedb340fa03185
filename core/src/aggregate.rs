//! Aggregates and change tracking.
//!
//! An aggregate is in-memory state derived entirely from applied events.
//! [`AggregateRoot`] wraps that state with the bookkeeping the repository
//! needs: the identifier, the committed version, and the uncommitted
//! events recorded by domain operations since load.

use crate::event::Event;
use crate::stream::Version;

/// State that is rebuilt by folding events.
///
/// `Default` provides the empty (version 0) state used when no snapshot is
/// available. `apply` must be a pure fold step: same state plus same event
/// always yields the same next state, because the same sequence is replayed
/// on every load.
///
/// # Examples
///
/// ```
/// use replay_core::aggregate::Aggregate;
/// use replay_core::event::Event;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Clone, Debug, Default, Serialize, Deserialize)]
/// struct Counter {
///     value: i64,
/// }
///
/// #[derive(Clone, Debug, Serialize, Deserialize)]
/// enum CounterEvent {
///     Incremented { by: i64 },
/// }
///
/// impl Event for CounterEvent {
///     fn event_type(&self) -> &'static str {
///         "CounterIncremented.v1"
///     }
/// }
///
/// impl Aggregate for Counter {
///     const TYPE_NAME: &'static str = "Counter";
///     type Event = CounterEvent;
///
///     fn apply(&mut self, event: &Self::Event) {
///         match event {
///             CounterEvent::Incremented { by } => self.value += by,
///         }
///     }
/// }
/// ```
pub trait Aggregate: Default + Send + Sync + 'static {
    /// The aggregate type name used in stream names (`"{TYPE_NAME}-{id}"`).
    const TYPE_NAME: &'static str;

    /// The event type this aggregate is folded from.
    type Event: Event;

    /// Fold one event into the state.
    fn apply(&mut self, event: &Self::Event);
}

/// An aggregate attached to a unit of work: state plus change tracking.
///
/// `version` counts the events already durable in the log (the snapshot
/// baseline plus everything replayed or committed). `changes` holds events
/// recorded since load that the next [`Repository::save`] will append.
/// The invariant `current_version() == version + changes.len()` holds at
/// all times: every recorded event has been applied to the state exactly
/// once.
///
/// [`Repository::save`]: crate::repository::Repository::save
#[derive(Debug)]
pub struct AggregateRoot<A: Aggregate> {
    id: String,
    state: A,
    version: Version,
    changes: Vec<A::Event>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Wrap a freshly created aggregate at version 0.
    #[must_use]
    pub fn new(id: impl Into<String>, state: A) -> Self {
        Self {
            id: id.into(),
            state,
            version: Version::INITIAL,
            changes: Vec::new(),
        }
    }

    /// Wrap state restored from a snapshot taken at `version`.
    #[must_use]
    pub fn from_snapshot(id: impl Into<String>, state: A, version: Version) -> Self {
        Self {
            id: id.into(),
            state,
            version,
            changes: Vec::new(),
        }
    }

    /// The aggregate identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read access to the aggregate state.
    #[must_use]
    pub const fn state(&self) -> &A {
        &self.state
    }

    /// The committed version: events durable in the log.
    #[must_use]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// The committed version plus uncommitted changes.
    #[must_use]
    pub fn current_version(&self) -> Version {
        self.version + self.changes.len() as u64
    }

    /// Record a new domain event: apply it to the state and queue it for
    /// the next save.
    pub fn record(&mut self, event: A::Event) {
        self.state.apply(&event);
        self.changes.push(event);
    }

    /// Replay an already-durable event during load. Advances the committed
    /// version instead of queueing a change.
    pub fn replay(&mut self, event: &A::Event) {
        self.state.apply(event);
        self.version = self.version.next();
    }

    /// Whether this root has uncommitted changes.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// The uncommitted events, oldest first.
    #[must_use]
    pub fn changes(&self) -> &[A::Event] {
        &self.changes
    }

    /// Mark all uncommitted changes as committed at `new_version`.
    ///
    /// Called by the repository after a successful append. Debug builds
    /// assert the log's arithmetic matches ours.
    pub fn mark_committed(&mut self, new_version: Version) {
        debug_assert_eq!(new_version, self.current_version());
        self.version = new_version;
        self.changes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Counter {
        value: i64,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    enum CounterEvent {
        Incremented { by: i64 },
    }

    impl Event for CounterEvent {
        fn event_type(&self) -> &'static str {
            "CounterIncremented.v1"
        }
    }

    impl Aggregate for Counter {
        const TYPE_NAME: &'static str = "Counter";
        type Event = CounterEvent;

        fn apply(&mut self, event: &Self::Event) {
            match event {
                CounterEvent::Incremented { by } => self.value += by,
            }
        }
    }

    #[test]
    fn record_applies_and_queues() {
        let mut root = AggregateRoot::new("c-1", Counter::default());
        root.record(CounterEvent::Incremented { by: 3 });
        root.record(CounterEvent::Incremented { by: 4 });

        assert_eq!(root.state().value, 7);
        assert_eq!(root.version(), Version::INITIAL);
        assert_eq!(root.current_version(), Version::new(2));
        assert_eq!(root.changes().len(), 2);
        assert!(root.has_changes());
    }

    #[test]
    fn replay_advances_committed_version_without_changes() {
        let mut root = AggregateRoot::new("c-1", Counter::default());
        root.replay(&CounterEvent::Incremented { by: 5 });

        assert_eq!(root.state().value, 5);
        assert_eq!(root.version(), Version::new(1));
        assert!(!root.has_changes());
    }

    #[test]
    fn mark_committed_clears_changes_and_bumps_version() {
        let mut root = AggregateRoot::new("c-1", Counter::default());
        root.record(CounterEvent::Incremented { by: 1 });
        root.record(CounterEvent::Incremented { by: 1 });

        root.mark_committed(Version::new(2));

        assert_eq!(root.version(), Version::new(2));
        assert!(!root.has_changes());
        assert_eq!(root.current_version(), Version::new(2));
    }

    #[test]
    fn from_snapshot_sets_baseline_version() {
        let root = AggregateRoot::from_snapshot("c-1", Counter { value: 10 }, Version::new(5));
        assert_eq!(root.version(), Version::new(5));
        assert_eq!(root.state().value, 10);
    }
}

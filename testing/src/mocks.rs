//! In-memory collaborator implementations.
//!
//! These are complete implementations of the collaborator traits, not
//! stubs: the event log enforces expected versions, keeps 1-based
//! positions, distinguishes never-written streams from deleted ones, and
//! honors slice boundaries, so tests exercise the same contract a real
//! backend would present.

use chrono::{DateTime, Utc};
use replay_core::checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
use replay_core::environment::Clock;
use replay_core::event::{EventData, RecordedEvent};
use replay_core::log::{AppendError, EventLog, LogError, Slice, SliceRead};
use replay_core::stream::{ExpectedVersion, StreamId, Version};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct StreamEntry {
    events: Vec<RecordedEvent>,
    deleted: bool,
}

/// In-memory append-only event log.
///
/// Cloning shares the underlying storage, so a repository and a
/// projection runner handed clones of the same log see the same streams.
///
/// # Example
///
/// ```
/// use replay_testing::mocks::InMemoryEventLog;
/// use replay_core::prelude::*;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let log = InMemoryEventLog::new();
/// let data = EventData::new("ProductCreated.v1".to_string(), vec![1, 2], None);
/// let version = log
///     .append(StreamId::new("Product-42"), ExpectedVersion::NoStream, vec![data])
///     .await
///     .unwrap();
/// assert_eq!(version, Version::new(1));
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryEventLog {
    streams: Arc<RwLock<HashMap<StreamId, StreamEntry>>>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a stream as deleted. Subsequent reads report
    /// [`SliceRead::Deleted`] and appends fail.
    pub fn delete_stream(&self, stream: &StreamId) {
        let mut streams = self.streams.write().unwrap();
        streams.entry(stream.clone()).or_default().deleted = true;
    }

    /// Current version (event count) of a stream, if it exists.
    #[must_use]
    pub fn stream_version(&self, stream: &StreamId) -> Option<Version> {
        self.streams
            .read()
            .unwrap()
            .get(stream)
            .map(|entry| Version::new(entry.events.len() as u64))
    }

    /// All records of a stream, for assertions.
    #[must_use]
    pub fn stream_events(&self, stream: &StreamId) -> Vec<RecordedEvent> {
        self.streams
            .read()
            .unwrap()
            .get(stream)
            .map(|entry| entry.events.clone())
            .unwrap_or_default()
    }

    /// Names of all streams ever written.
    #[must_use]
    pub fn stream_names(&self) -> Vec<StreamId> {
        self.streams.read().unwrap().keys().cloned().collect()
    }
}

impl EventLog for InMemoryEventLog {
    fn read_forward(
        &self,
        stream: StreamId,
        from: u64,
        max: usize,
    ) -> Pin<Box<dyn Future<Output = Result<SliceRead, LogError>> + Send + '_>> {
        Box::pin(async move {
            let streams = self.streams.read().unwrap();
            let Some(entry) = streams.get(&stream) else {
                return Ok(SliceRead::NoStream);
            };
            if entry.deleted {
                return Ok(SliceRead::Deleted);
            }

            let from = from.max(1);
            let start = (from - 1) as usize;
            let events: Vec<RecordedEvent> = entry
                .events
                .iter()
                .skip(start)
                .take(max)
                .cloned()
                .collect();
            let next_position = from + events.len() as u64;
            let end_of_stream = next_position > entry.events.len() as u64;

            Ok(SliceRead::Events(Slice {
                events,
                next_position,
                end_of_stream,
            }))
        })
    }

    fn read_last(
        &self,
        stream: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<SliceRead, LogError>> + Send + '_>> {
        Box::pin(async move {
            let streams = self.streams.read().unwrap();
            let Some(entry) = streams.get(&stream) else {
                return Ok(SliceRead::NoStream);
            };
            if entry.deleted {
                return Ok(SliceRead::Deleted);
            }

            let events: Vec<RecordedEvent> = entry.events.last().cloned().into_iter().collect();
            Ok(SliceRead::Events(Slice {
                events,
                next_position: entry.events.len() as u64 + 1,
                end_of_stream: true,
            }))
        })
    }

    fn append(
        &self,
        stream: StreamId,
        expected: ExpectedVersion,
        events: Vec<EventData>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, AppendError>> + Send + '_>> {
        Box::pin(async move {
            let mut streams = self.streams.write().unwrap();
            let exists = streams.contains_key(&stream);
            let entry = streams.entry(stream.clone()).or_default();

            if entry.deleted {
                return Err(AppendError::StreamDeleted(stream));
            }

            let actual = Version::new(entry.events.len() as u64);
            let satisfied = match expected {
                ExpectedVersion::Any => true,
                ExpectedVersion::NoStream => !exists,
                ExpectedVersion::Exact(version) => version == actual,
            };
            if !satisfied {
                // An append never creates a stream it then rejects.
                if !exists {
                    streams.remove(&stream);
                }
                return Err(AppendError::WrongVersion {
                    stream,
                    expected,
                    actual,
                });
            }

            let mut position = actual.value();
            for data in events {
                position += 1;
                entry.events.push(RecordedEvent {
                    stream: stream.clone(),
                    position,
                    event_type: data.event_type,
                    data: data.data,
                    metadata: data.metadata,
                });
            }
            Ok(Version::new(position))
        })
    }
}

/// In-memory checkpoint store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: Arc<RwLock<HashMap<String, Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every checkpoint, for test isolation.
    pub fn clear(&self) {
        self.checkpoints.write().unwrap().clear();
    }

    /// Synchronous peek at a checkpoint, for assertions.
    #[must_use]
    pub fn position(&self, projection: &str) -> Option<u64> {
        self.checkpoints
            .read()
            .unwrap()
            .get(projection)
            .map(|c| c.position)
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(
        &self,
        projection: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>, CheckpointError>> + Send + '_>>
    {
        let projection = projection.to_string();
        Box::pin(async move {
            Ok(self
                .checkpoints
                .read()
                .unwrap()
                .get(&projection)
                .copied())
        })
    }

    fn save(
        &self,
        projection: &str,
        checkpoint: Checkpoint,
    ) -> Pin<Box<dyn Future<Output = Result<(), CheckpointError>> + Send + '_>> {
        let projection = projection.to_string();
        Box::pin(async move {
            self.checkpoints
                .write()
                .unwrap()
                .insert(projection, checkpoint);
            Ok(())
        })
    }
}

/// Fixed clock for deterministic tests.
///
/// Always returns the same instant, making timestamps reproducible.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a fixed clock pinned at the given instant.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}

/// A default fixed clock for tests (2025-01-01 00:00:00 UTC).
#[must_use]
#[allow(clippy::expect_used)] // Panics: hardcoded timestamp always parses
pub fn test_clock() -> FixedClock {
    FixedClock::new(
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc),
    )
}

#[cfg(test)]
#[allow(clippy::panic)] // Intentional panics in test assertions
mod tests {
    use super::*;

    fn data(tag: &str) -> EventData {
        EventData::new(tag.to_string(), vec![1], None)
    }

    #[tokio::test]
    async fn read_of_unknown_stream_is_no_stream() {
        let log = InMemoryEventLog::new();
        let read = log
            .read_forward(StreamId::new("Product-404"), 1, 10)
            .await
            .unwrap();
        assert!(matches!(read, SliceRead::NoStream));

        let last = log.read_last(StreamId::new("Product-404")).await.unwrap();
        assert!(matches!(last, SliceRead::NoStream));
    }

    #[tokio::test]
    async fn deleted_stream_reads_deleted_and_rejects_appends() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("Product-1");
        log.append(stream.clone(), ExpectedVersion::NoStream, vec![data("E.v1")])
            .await
            .unwrap();
        log.delete_stream(&stream);

        let read = log.read_forward(stream.clone(), 1, 10).await.unwrap();
        assert!(matches!(read, SliceRead::Deleted));

        let result = log
            .append(stream, ExpectedVersion::Any, vec![data("E.v1")])
            .await;
        assert!(matches!(result, Err(AppendError::StreamDeleted(_))));
    }

    #[tokio::test]
    async fn positions_are_one_based_and_contiguous() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("Product-1");
        log.append(
            stream.clone(),
            ExpectedVersion::NoStream,
            vec![data("A.v1"), data("B.v1"), data("C.v1")],
        )
        .await
        .unwrap();

        let SliceRead::Events(slice) = log.read_forward(stream, 1, 10).await.unwrap() else {
            panic!("stream should exist");
        };
        let positions: Vec<u64> = slice.events.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(slice.end_of_stream);
    }

    #[tokio::test]
    async fn slice_boundary_is_not_end_of_stream() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("Product-1");
        log.append(
            stream.clone(),
            ExpectedVersion::NoStream,
            vec![data("A.v1"), data("B.v1")],
        )
        .await
        .unwrap();

        // Slice size exactly divides stream length: first slice must not
        // claim end-of-stream.
        let SliceRead::Events(first) = log.read_forward(stream.clone(), 1, 2).await.unwrap()
        else {
            panic!("stream should exist");
        };
        assert_eq!(first.events.len(), 2);
        assert!(!first.end_of_stream);
        assert_eq!(first.next_position, 3);

        let SliceRead::Events(rest) = log.read_forward(stream, 3, 2).await.unwrap() else {
            panic!("stream should exist");
        };
        assert!(rest.events.is_empty());
        assert!(rest.end_of_stream);
    }

    #[tokio::test]
    async fn expected_version_mismatch_is_rejected() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("Product-1");
        log.append(stream.clone(), ExpectedVersion::NoStream, vec![data("A.v1")])
            .await
            .unwrap();

        let result = log
            .append(
                stream.clone(),
                ExpectedVersion::Exact(Version::new(5)),
                vec![data("B.v1")],
            )
            .await;
        assert!(matches!(
            result,
            Err(AppendError::WrongVersion { actual, .. }) if actual == Version::new(1)
        ));

        // NoStream against an existing stream also conflicts.
        let result = log
            .append(stream, ExpectedVersion::NoStream, vec![data("B.v1")])
            .await;
        assert!(matches!(result, Err(AppendError::WrongVersion { .. })));
    }

    #[tokio::test]
    async fn rejected_create_leaves_no_stream_behind() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("Product-1");
        let result = log
            .append(
                stream.clone(),
                ExpectedVersion::Exact(Version::new(3)),
                vec![data("A.v1")],
            )
            .await;
        assert!(result.is_err());

        let read = log.read_forward(stream, 1, 10).await.unwrap();
        assert!(matches!(read, SliceRead::NoStream));
    }

    #[tokio::test]
    async fn read_last_returns_only_the_latest_record() {
        let log = InMemoryEventLog::new();
        let stream = StreamId::new("Product-1-Snapshot");
        log.append(
            stream.clone(),
            ExpectedVersion::Any,
            vec![data("S.v1"), data("S.v1"), data("S.v1")],
        )
        .await
        .unwrap();

        let SliceRead::Events(slice) = log.read_last(stream).await.unwrap() else {
            panic!("stream should exist");
        };
        assert_eq!(slice.events.len(), 1);
        assert_eq!(slice.events[0].position, 3);
    }

    #[tokio::test]
    async fn checkpoint_store_roundtrip() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load("P").await.unwrap().is_none());

        let checkpoint = Checkpoint::new(42, test_clock().now());
        store.save("P", checkpoint).await.unwrap();
        assert_eq!(store.load("P").await.unwrap(), Some(checkpoint));
        assert_eq!(store.position("P"), Some(42));
    }

    #[test]
    fn fixed_clock_is_fixed() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }
}

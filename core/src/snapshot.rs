//! Snapshots: point-in-time materializations of aggregate state.
//!
//! A snapshot is a pure performance optimization. The event log stays the
//! source of truth; a snapshot only lets a load skip the replay of history
//! up to the version it was captured at. Snapshots are appended to a
//! dedicated `…-Snapshot` stream, so earlier snapshots are never
//! overwritten; readers always take the latest record.
//!
//! Because snapshots are an optimization, writing one is best-effort: a
//! failed snapshot write is logged and swallowed, and must never make an
//! already-durable commit look like a failure. Reading one is not
//! symmetric: a missing snapshot is a normal `None`, but a snapshot that
//! exists and cannot be decoded is a hard error, since silently replaying
//! from zero would mask corrupt data.

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::event::{CodecError, EventData};
use crate::log::{AppendError, EventLog, LogError, SliceRead};
use crate::naming::StreamNamer;
use crate::stream::{ExpectedVersion, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::ops::RangeInclusive;
use std::sync::Arc;
use thiserror::Error;

/// Type tag for snapshot records.
pub const SNAPSHOT_EVENT_TYPE: &str = "AggregateSnapshot.v1";

/// Error reading a snapshot.
///
/// Absence is not represented here: "no snapshot stream", "stream
/// deleted", and "zero records" all surface as `Ok(None)` from
/// [`SnapshotReader::read_optional`].
#[derive(Error, Debug)]
pub enum SnapshotReadError {
    /// The latest snapshot record exists but cannot be decoded.
    #[error("Malformed snapshot record: {0}")]
    Decode(#[from] CodecError),

    /// The log backend failed.
    #[error(transparent)]
    Log(#[from] LogError),
}

/// A captured aggregate state and the version it was captured at.
///
/// The state blob is opaque to the log and to the reader; only the
/// repository that owns the aggregate type can restore it. Invariant: the
/// version is never greater than the source stream's length at capture
/// time, so replay from `version + 1` never skips an event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// Stream version at capture time (events folded into the state).
    pub version: Version,
    /// Opaque encoded aggregate state.
    pub state: Vec<u8>,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Capture aggregate state into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the state cannot be serialized.
    pub fn capture<A: Serialize>(
        state: &A,
        version: Version,
        taken_at: DateTime<Utc>,
    ) -> Result<Self, CodecError> {
        let state =
            bincode::serialize(state).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(Self {
            version,
            state,
            taken_at,
        })
    }

    /// Restore the captured aggregate state.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the blob does not parse as `A`.
    pub fn restore<A: DeserializeOwned>(&self) -> Result<A, CodecError> {
        bincode::deserialize(&self.state).map_err(|e| CodecError::Decode {
            event_type: SNAPSHOT_EVENT_TYPE.to_string(),
            reason: e.to_string(),
        })
    }

    fn to_event_data(&self) -> Result<EventData, CodecError> {
        let data =
            bincode::serialize(self).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(EventData::new(SNAPSHOT_EVENT_TYPE.to_string(), data, None))
    }

    fn from_record_data(data: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(data).map_err(|e| CodecError::Decode {
            event_type: SNAPSHOT_EVENT_TYPE.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Reads the most recent snapshot of an aggregate, if one exists.
#[derive(Clone)]
pub struct SnapshotReader {
    log: Arc<dyn EventLog>,
    namer: StreamNamer,
}

impl SnapshotReader {
    /// Create a reader over the given log and naming convention.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, namer: StreamNamer) -> Self {
        Self { log, namer }
    }

    /// Read the latest snapshot for an aggregate identifier.
    ///
    /// One backward read of length 1 against the snapshot stream. Returns
    /// `Ok(None)` when the stream does not exist, was deleted, or holds no
    /// records.
    ///
    /// # Errors
    ///
    /// - [`SnapshotReadError::Decode`] when the record exists but is
    ///   malformed — never converted to `None`.
    /// - [`SnapshotReadError::Log`] for infrastructure failures.
    pub async fn read_optional(
        &self,
        identifier: &str,
    ) -> Result<Option<Snapshot>, SnapshotReadError> {
        let stream = self.namer.snapshot_stream(identifier);
        match self.log.read_last(stream).await? {
            SliceRead::NoStream | SliceRead::Deleted => Ok(None),
            SliceRead::Events(slice) => match slice.events.last() {
                None => Ok(None),
                Some(record) => Ok(Some(Snapshot::from_record_data(&record.data)?)),
            },
        }
    }
}

/// Decides, from a single committed event position, whether to snapshot.
///
/// The predicate sees only one position at a time, never the history, so
/// any policy must be evaluable per event. The canonical policy is
/// [`every`](SnapshotPolicy::every): snapshot when the position is
/// positive and divisible by the interval.
pub struct SnapshotPolicy(Box<dyn Fn(u64) -> bool + Send + Sync>);

impl SnapshotPolicy {
    /// Snapshot at every `interval`-th event position.
    ///
    /// With `interval = 5`, positions 5, 10, 15, … trigger; position 0
    /// never does.
    #[must_use]
    pub fn every(interval: u64) -> Self {
        Self(Box::new(move |position| {
            position > 0 && position % interval == 0
        }))
    }

    /// A custom predicate over the committed event position.
    #[must_use]
    pub fn custom(predicate: impl Fn(u64) -> bool + Send + Sync + 'static) -> Self {
        Self(Box::new(predicate))
    }

    /// Evaluate the policy for one event position.
    #[must_use]
    pub fn should_snapshot(&self, position: u64) -> bool {
        (self.0)(position)
    }
}

impl std::fmt::Debug for SnapshotPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SnapshotPolicy")
    }
}

/// Writes snapshots after successful commits, per a [`SnapshotPolicy`].
pub struct Snapshotter {
    log: Arc<dyn EventLog>,
    namer: StreamNamer,
    policy: SnapshotPolicy,
    now: Arc<dyn crate::environment::Clock>,
}

impl Snapshotter {
    /// Create a snapshotter over the given log, naming convention, policy,
    /// and clock.
    #[must_use]
    pub fn new(
        log: Arc<dyn EventLog>,
        namer: StreamNamer,
        policy: SnapshotPolicy,
        now: Arc<dyn crate::environment::Clock>,
    ) -> Self {
        Self {
            log,
            namer,
            policy,
            now,
        }
    }

    /// Consider a just-committed aggregate for snapshotting.
    ///
    /// `committed` is the range of event positions the commit just made
    /// durable. If any of them satisfies the policy, the aggregate's
    /// current full state is appended to the snapshot stream. Write
    /// failures are logged and swallowed: the events are already durable
    /// and the save they belong to has succeeded.
    pub async fn after_commit<A>(&self, root: &AggregateRoot<A>, committed: RangeInclusive<u64>)
    where
        A: Aggregate + Serialize,
    {
        if !committed.clone().any(|p| self.policy.should_snapshot(p)) {
            return;
        }

        if let Err(error) = self.write_snapshot(root).await {
            tracing::warn!(
                aggregate = root.id(),
                version = %root.version(),
                %error,
                "snapshot write failed; commit unaffected"
            );
        }
    }

    async fn write_snapshot<A>(&self, root: &AggregateRoot<A>) -> Result<(), SnapshotWriteError>
    where
        A: Aggregate + Serialize,
    {
        let snapshot = Snapshot::capture(root.state(), root.version(), self.now.now())?;
        let data = snapshot.to_event_data()?;
        let stream = self.namer.snapshot_stream(root.id());
        self.log
            .append(stream, ExpectedVersion::Any, vec![data])
            .await?;
        tracing::info!(
            aggregate = root.id(),
            version = %root.version(),
            "snapshot written"
        );
        Ok(())
    }
}

/// Internal error for a failed snapshot write; only ever logged.
#[derive(Error, Debug)]
enum SnapshotWriteError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Append(#[from] AppendError),
}

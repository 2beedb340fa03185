//! The event log collaborator interface.
//!
//! The log itself (a networked event store, a database, an in-memory fake)
//! lives behind this trait. It exposes three primitives, each keyed by a
//! stream name: read forward from a position, read the last record, and
//! append with an expected version. Everything else in this workspace is
//! built from those three calls.
//!
//! # Absence vs errors
//!
//! Reads report "stream not found" and "stream deleted" as first-class
//! [`SliceRead`] statuses, never as errors and never inferred from an empty
//! slice. An empty slice with `end_of_stream` set is a legitimate read of an
//! existing stream's end, and a missing stream is a legitimate answer to a
//! question about history; only infrastructure failures are `Err`.
//!
//! # Dyn compatibility
//!
//! The trait returns explicit `Pin<Box<dyn Future>>` instead of `async fn`
//! so it can be used as a trait object (`Arc<dyn EventLog>`) and shared
//! across repositories and projection runners.

use crate::event::{EventData, RecordedEvent};
use crate::stream::{ExpectedVersion, StreamId, Version};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Infrastructure failure while reading from the log.
#[derive(Error, Debug)]
pub enum LogError {
    /// The log backend failed (connection, storage, protocol).
    #[error("Event log backend error: {0}")]
    Backend(String),
}

/// Failure while appending to the log.
#[derive(Error, Debug)]
pub enum AppendError {
    /// Optimistic concurrency check failed: another writer committed
    /// between this writer's load and its append. Recoverable by the
    /// caller (reload, reapply, retry); never retried implicitly.
    #[error("Concurrency conflict on {stream}: expected version {expected}, found {actual}")]
    WrongVersion {
        /// The stream where the conflict occurred.
        stream: StreamId,
        /// The version the writer expected.
        expected: ExpectedVersion,
        /// The stream's actual current version.
        actual: Version,
    },

    /// The stream has been deleted and cannot be appended to.
    #[error("Stream deleted: {0}")]
    StreamDeleted(StreamId),

    /// The log backend failed.
    #[error("Event log backend error: {0}")]
    Backend(String),
}

/// A bounded batch of consecutive records read in one call.
#[derive(Clone, Debug)]
pub struct Slice {
    /// The records, in strictly increasing position order. May be empty
    /// when reading at or past the end of the stream.
    pub events: Vec<RecordedEvent>,
    /// The position the next forward read should start from.
    pub next_position: u64,
    /// Whether this slice reached the current end of the stream.
    ///
    /// Readers must loop until this sentinel is set rather than inferring
    /// completion from slice size: a stream length that is an exact
    /// multiple of the slice size would otherwise look complete one slice
    /// early.
    pub end_of_stream: bool,
}

/// Outcome of a read, with absence kept distinct from slice shape.
#[derive(Clone, Debug)]
pub enum SliceRead {
    /// The stream exists; here is a slice of it.
    Events(Slice),
    /// The stream has never been written to.
    NoStream,
    /// The stream existed and has been deleted.
    Deleted,
}

impl SliceRead {
    /// Whether this read found an existing, non-deleted stream.
    #[must_use]
    pub const fn stream_exists(&self) -> bool {
        matches!(self, Self::Events(_))
    }
}

/// Append-only event log service, keyed by stream name.
///
/// Implementations must be `Send + Sync`; concurrent writers are arbitrated
/// by the expected-version check on [`append`](EventLog::append), never by
/// in-memory locks held by callers. Each call is atomic: a failed or
/// cancelled append leaves no partial records behind.
pub trait EventLog: Send + Sync {
    /// Read up to `max` records forward, starting at 1-based position
    /// `from` (inclusive).
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] only for infrastructure failures; absent and
    /// deleted streams are reported through [`SliceRead`].
    fn read_forward(
        &self,
        stream: StreamId,
        from: u64,
        max: usize,
    ) -> Pin<Box<dyn Future<Output = Result<SliceRead, LogError>> + Send + '_>>;

    /// Read the single most recent record of a stream (backward read of
    /// length 1). The returned slice holds zero or one record.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] only for infrastructure failures.
    fn read_last(
        &self,
        stream: StreamId,
    ) -> Pin<Box<dyn Future<Output = Result<SliceRead, LogError>> + Send + '_>>;

    /// Append records to a stream, enforcing the expected version.
    ///
    /// Returns the stream's new version. The append is atomic: either all
    /// records are durable or none are.
    ///
    /// # Errors
    ///
    /// - [`AppendError::WrongVersion`] when the stream's actual version
    ///   does not satisfy `expected`.
    /// - [`AppendError::StreamDeleted`] when appending to a deleted stream.
    /// - [`AppendError::Backend`] for infrastructure failures.
    fn append(
        &self,
        stream: StreamId,
        expected: ExpectedVersion,
        events: Vec<EventData>,
    ) -> Pin<Box<dyn Future<Output = Result<Version, AppendError>> + Send + '_>>;
}

//! Stream identification and versioning types.
//!
//! A stream is an append-only, strictly ordered sequence of records
//! identified by a [`StreamId`]. Record positions are 1-based, so the
//! position of the last record in a stream always equals the stream's
//! [`Version`] (the number of records it contains). An empty stream is at
//! `Version(0)` and contains no positions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for [`StreamId`] parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream id: {0}")]
pub struct ParseStreamIdError(String);

/// Name of an append-only stream in the event log.
///
/// For aggregates the name is produced by
/// [`StreamNamer`](crate::naming::StreamNamer) and encodes the aggregate
/// type and identifier, e.g. `"Product-42"`. Snapshot streams carry the
/// `-Snapshot` suffix, e.g. `"Product-42-Snapshot"`.
///
/// `StreamId` is a newtype over `String`: it keeps stream names from being
/// confused with aggregate identifiers or projection names in signatures.
///
/// # Examples
///
/// ```
/// use replay_core::stream::StreamId;
///
/// let stream = StreamId::new("Product-42");
/// assert_eq!(stream.as_str(), "Product-42");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(String);

impl StreamId {
    /// Create a new `StreamId` from a string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the stream name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the `StreamId` into its inner `String`.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StreamId {
    type Err = ParseStreamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseStreamIdError(
                "stream id cannot be empty".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for StreamId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StreamId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Number of events in a stream, or applied to an aggregate.
///
/// Versions count events: an empty stream is at version 0, a stream with
/// seven records is at version 7, and the record appended by the next
/// commit occupies position 8. Because positions are 1-based, "the version
/// after event N" and "the position of event N" are the same number, which
/// keeps snapshot bookkeeping exact: a snapshot taken at version 5 means
/// replay resumes from position 6.
///
/// # Examples
///
/// ```
/// use replay_core::stream::Version;
///
/// let v = Version::new(5);
/// assert_eq!(v.next(), Version::new(6));
/// assert_eq!(v.value(), 5);
/// assert!(Version::INITIAL.is_initial());
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of an empty stream (zero events).
    pub const INITIAL: Self = Self(0);

    /// Create a `Version` with the given event count.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the event count.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The version after one more event.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Whether this is the initial version (no events yet).
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl std::ops::Add<u64> for Version {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

/// Concurrency expectation for an append.
///
/// The event log is the single arbiter of truth for concurrent writers:
/// instead of locking, an append states what version the writer believes
/// the stream is at, and the log rejects the append when reality disagrees.
///
/// - `NoStream`: the stream must not exist yet (create flows).
/// - `Exact(v)`: the stream must currently be at version `v`.
/// - `Any`: append unconditionally. Used for snapshot streams, where
///   history accumulates and concurrent snapshot writers are harmless.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The stream must not exist.
    NoStream,
    /// The stream must be at exactly this version.
    Exact(Version),
    /// No concurrency check.
    Any,
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStream => write!(f, "no stream"),
            Self::Exact(v) => write!(f, "{v}"),
            Self::Any => write!(f, "any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod stream_id_tests {
        use super::*;

        #[test]
        fn new_creates_stream_id() {
            let id = StreamId::new("Product-42");
            assert_eq!(id.as_str(), "Product-42");
        }

        #[test]
        #[allow(clippy::expect_used)] // Panics: test fails if parse fails
        fn parse_from_str() {
            let id: StreamId = "Product-42".parse().expect("parse should succeed");
            assert_eq!(id, StreamId::new("Product-42"));
        }

        #[test]
        fn parse_empty_string_fails() {
            assert!("".parse::<StreamId>().is_err());
        }

        #[test]
        fn display_and_into_inner() {
            let id = StreamId::new("Product-42");
            assert_eq!(format!("{id}"), "Product-42");
            assert_eq!(id.into_inner(), "Product-42");
        }
    }

    mod version_tests {
        use super::*;

        #[test]
        fn initial_version_is_zero() {
            assert_eq!(Version::INITIAL, Version::new(0));
            assert!(Version::INITIAL.is_initial());
            assert!(!Version::new(1).is_initial());
        }

        #[test]
        fn next_counts_events() {
            let v = Version::INITIAL.next().next().next();
            assert_eq!(v, Version::new(3));
        }

        #[test]
        fn version_ordering_and_arithmetic() {
            assert!(Version::new(1) < Version::new(2));
            assert_eq!(Version::new(5) + 3, Version::new(8));
        }

        #[test]
        fn conversions() {
            let v = Version::from(42_u64);
            assert_eq!(v.value(), 42);
            let raw: u64 = v.into();
            assert_eq!(raw, 42);
        }
    }

    mod expected_version_tests {
        use super::*;

        #[test]
        fn display() {
            assert_eq!(format!("{}", ExpectedVersion::NoStream), "no stream");
            assert_eq!(format!("{}", ExpectedVersion::Exact(Version::new(7))), "7");
            assert_eq!(format!("{}", ExpectedVersion::Any), "any");
        }
    }
}

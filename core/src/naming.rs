//! Stream naming conventions.
//!
//! Stream names must be reproduced bit-exactly for compatibility with
//! existing logs: the primary stream for an aggregate is
//! `"{AggregateTypeName}-{identifier}"` and its snapshot stream is
//! `"{primary stream name}-Snapshot"`.

use crate::stream::StreamId;

/// Pure mapping from (aggregate type, identifier) to stream names.
///
/// A `StreamNamer` is constructed once per aggregate type and passed
/// explicitly into the components that need it (repository, snapshot
/// reader, snapshotter); there is no global naming registry.
///
/// # Examples
///
/// ```
/// use replay_core::naming::StreamNamer;
///
/// let namer = StreamNamer::new("Product");
/// assert_eq!(namer.stream("42").as_str(), "Product-42");
/// assert_eq!(namer.snapshot_stream("42").as_str(), "Product-42-Snapshot");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamNamer {
    type_name: &'static str,
}

impl StreamNamer {
    /// Create a namer for the given aggregate type name.
    #[must_use]
    pub const fn new(type_name: &'static str) -> Self {
        Self { type_name }
    }

    /// The aggregate type name this namer resolves for.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The primary stream for an aggregate identifier.
    #[must_use]
    pub fn stream(&self, identifier: &str) -> StreamId {
        StreamId::new(format!("{}-{identifier}", self.type_name))
    }

    /// The snapshot stream for an aggregate identifier.
    #[must_use]
    pub fn snapshot_stream(&self, identifier: &str) -> StreamId {
        StreamId::new(format!("{}-{identifier}-Snapshot", self.type_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_stream_name() {
        let namer = StreamNamer::new("Product");
        assert_eq!(namer.stream("42"), StreamId::new("Product-42"));
    }

    #[test]
    fn snapshot_stream_derives_from_primary() {
        let namer = StreamNamer::new("Product");
        assert_eq!(
            namer.snapshot_stream("42"),
            StreamId::new("Product-42-Snapshot")
        );
    }

    #[test]
    fn identifier_with_dashes_is_preserved() {
        let namer = StreamNamer::new("Order");
        assert_eq!(
            namer.stream("abc-def").as_str(),
            "Order-abc-def"
        );
    }
}

//! Repository and unit of work: the load/mutate/save discipline.
//!
//! A [`Repository`] is constructed per logical operation (one command),
//! together with the [`UnitOfWork`] it owns. `load` rehydrates an
//! aggregate — from its latest snapshot when a reader is configured, then
//! by replaying the stream tail in slices — and attaches it to the unit of
//! work. Domain code mutates the attached root; `save` appends every
//! tracked root's uncommitted events with an optimistic-concurrency check.
//!
//! Two concurrent operations loading the same identifier get independent
//! in-memory copies and race at save time; the log's expected-version
//! check is the single arbiter, and the loser receives
//! [`RepositoryError::Conflict`]. The repository never retries: retrying
//! would re-run non-idempotent domain logic behind the caller's back, so
//! the reload/reapply/save loop is the caller's decision.

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::event::{CodecError, EventCodec};
use crate::log::{AppendError, EventLog, LogError, SliceRead};
use crate::naming::StreamNamer;
use crate::snapshot::{SnapshotReadError, SnapshotReader, Snapshotter};
use crate::stream::{ExpectedVersion, StreamId, Version};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use thiserror::Error;

/// Slice size used when none is configured.
pub const DEFAULT_SLICE_SIZE: usize = 500;

/// Errors from repository load and save.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Neither a snapshot nor any log records exist for the identifier.
    #[error("No aggregate history for {0}")]
    NotFound(String),

    /// An aggregate with this identifier is already attached to the unit
    /// of work; `create` cannot attach a second copy.
    #[error("Aggregate {0} is already attached to this unit of work")]
    AlreadyAttached(String),

    /// A stored event or snapshot payload is malformed. Fatal to the read.
    #[error(transparent)]
    Decode(#[from] CodecError),

    /// Another writer committed between this operation's load and save.
    #[error("Concurrency conflict on {stream}: expected version {expected}, found {actual}")]
    Conflict {
        /// The stream where the conflict occurred.
        stream: StreamId,
        /// The version this writer expected.
        expected: ExpectedVersion,
        /// The stream's actual version at append time.
        actual: Version,
    },

    /// The aggregate's stream has been deleted.
    #[error("Stream deleted: {0}")]
    StreamDeleted(StreamId),

    /// The log backend failed.
    #[error(transparent)]
    Log(#[from] LogError),
}

impl From<SnapshotReadError> for RepositoryError {
    fn from(error: SnapshotReadError) -> Self {
        match error {
            SnapshotReadError::Decode(e) => Self::Decode(e),
            SnapshotReadError::Log(e) => Self::Log(e),
        }
    }
}

impl From<AppendError> for RepositoryError {
    fn from(error: AppendError) -> Self {
        match error {
            AppendError::WrongVersion {
                stream,
                expected,
                actual,
            } => Self::Conflict {
                stream,
                expected,
                actual,
            },
            AppendError::StreamDeleted(stream) => Self::StreamDeleted(stream),
            AppendError::Backend(msg) => Self::Log(LogError::Backend(msg)),
        }
    }
}

/// Operation-scoped registry of attached aggregates.
///
/// The unit of work exists for the duration of one logical operation and
/// is discarded with its repository afterwards — it is never persisted.
/// Its single job is answering "what did this operation touch, and which
/// of it changed" at save time.
#[derive(Debug)]
pub struct UnitOfWork<A: Aggregate> {
    attached: HashMap<String, AggregateRoot<A>>,
}

impl<A: Aggregate> UnitOfWork<A> {
    /// Create an empty unit of work.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attached: HashMap::new(),
        }
    }

    /// Attach a root under its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::AlreadyAttached`] if the identifier is
    /// already tracked; an operation holds at most one copy of an
    /// aggregate.
    pub fn attach(
        &mut self,
        root: AggregateRoot<A>,
    ) -> Result<&mut AggregateRoot<A>, RepositoryError> {
        match self.attached.entry(root.id().to_string()) {
            Entry::Occupied(_) => Err(RepositoryError::AlreadyAttached(root.id().to_string())),
            Entry::Vacant(slot) => Ok(slot.insert(root)),
        }
    }

    /// Whether an identifier is attached.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.attached.contains_key(id)
    }

    /// Read access to an attached root.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AggregateRoot<A>> {
        self.attached.get(id)
    }

    /// Mutable access to an attached root.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut AggregateRoot<A>> {
        self.attached.get_mut(id)
    }

    /// Identifiers of attached roots with uncommitted changes.
    #[must_use]
    pub fn changed_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .attached
            .values()
            .filter(|root| root.has_changes())
            .map(|root| root.id().to_string())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of attached roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attached.len()
    }

    /// Whether nothing is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }
}

impl<A: Aggregate> Default for UnitOfWork<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Loads aggregates from the log and commits their changes back.
///
/// All configuration is explicit at construction: the log, the codec, the
/// slice size, and the optional snapshot reader and snapshotter. The
/// stream naming convention comes from [`Aggregate::TYPE_NAME`].
///
/// # Examples
///
/// ```ignore
/// let mut repository = Repository::<Product>::new(log, Arc::new(BincodeCodec))
///     .with_snapshots(reader)
///     .with_snapshotter(snapshotter);
///
/// let product = repository.load("42").await?;
/// product.record(ProductEvent::VariantAdded { /* … */ });
/// repository.save().await?;
/// ```
pub struct Repository<A: Aggregate> {
    log: Arc<dyn EventLog>,
    codec: Arc<dyn EventCodec<A::Event>>,
    namer: StreamNamer,
    slice_size: usize,
    snapshots: Option<SnapshotReader>,
    snapshotter: Option<Snapshotter>,
    uow: UnitOfWork<A>,
}

impl<A: Aggregate> Repository<A> {
    /// Create a repository over the given log and codec.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, codec: Arc<dyn EventCodec<A::Event>>) -> Self {
        Self {
            log,
            codec,
            namer: StreamNamer::new(A::TYPE_NAME),
            slice_size: DEFAULT_SLICE_SIZE,
            snapshots: None,
            snapshotter: None,
            uow: UnitOfWork::new(),
        }
    }

    /// Set the forward-read slice size.
    #[must_use]
    pub const fn with_slice_size(mut self, slice_size: usize) -> Self {
        self.slice_size = slice_size;
        self
    }

    /// Accelerate loads with a snapshot reader.
    #[must_use]
    pub fn with_snapshots(mut self, reader: SnapshotReader) -> Self {
        self.snapshots = Some(reader);
        self
    }

    /// Write snapshots after commits, per the snapshotter's policy.
    #[must_use]
    pub fn with_snapshotter(mut self, snapshotter: Snapshotter) -> Self {
        self.snapshotter = Some(snapshotter);
        self
    }

    /// The unit of work tracking this operation's aggregates.
    #[must_use]
    pub const fn unit_of_work(&self) -> &UnitOfWork<A> {
        &self.uow
    }

    /// Mutable access to an already-attached root.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut AggregateRoot<A>> {
        self.uow.get_mut(id)
    }

    /// Attach a brand-new aggregate for a create flow.
    ///
    /// Create and load are deliberately separate call sites: `load` of an
    /// identifier with no history is [`RepositoryError::NotFound`], never
    /// an implicit empty aggregate. A root attached here saves with
    /// [`ExpectedVersion::NoStream`].
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::AlreadyAttached`] if the identifier is
    /// already tracked by this operation.
    pub fn create(
        &mut self,
        id: &str,
        aggregate: A,
    ) -> Result<&mut AggregateRoot<A>, RepositoryError> {
        self.uow.attach(AggregateRoot::new(id, aggregate))
    }

    /// Load an aggregate and attach it to the unit of work.
    ///
    /// When a snapshot reader is configured and finds a snapshot, the
    /// state is restored at the snapshot's version and only the stream
    /// tail is replayed; otherwise replay starts from the beginning.
    /// Slices are read forward until the log's end-of-stream sentinel,
    /// never inferring completion from slice size. Loading an identifier
    /// already attached to this operation returns the attached copy
    /// without touching the log.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::NotFound`] when neither a snapshot nor any
    ///   log records exist.
    /// - [`RepositoryError::Decode`] when a snapshot or event payload is
    ///   malformed.
    /// - [`RepositoryError::Log`] for infrastructure failures.
    pub async fn load(&mut self, id: &str) -> Result<&mut AggregateRoot<A>, RepositoryError>
    where
        A: DeserializeOwned,
    {
        if self.uow.contains(id) {
            // contains() guarantees presence; NotFound here is unreachable
            return self
                .uow
                .get_mut(id)
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()));
        }

        let snapshot = match &self.snapshots {
            Some(reader) => reader.read_optional(id).await?,
            None => None,
        };
        let had_snapshot = snapshot.is_some();

        let mut root = match snapshot {
            Some(snapshot) => {
                AggregateRoot::from_snapshot(id, snapshot.restore::<A>()?, snapshot.version)
            }
            None => AggregateRoot::new(id, A::default()),
        };

        let stream = self.namer.stream(id);
        let mut from = root.version().value() + 1;
        let mut replayed = 0_u64;

        loop {
            match self
                .log
                .read_forward(stream.clone(), from, self.slice_size)
                .await?
            {
                SliceRead::NoStream | SliceRead::Deleted => break,
                SliceRead::Events(slice) => {
                    for record in &slice.events {
                        let event = self.codec.decode(record)?;
                        root.replay(&event);
                        replayed += 1;
                    }
                    if slice.end_of_stream {
                        break;
                    }
                    from = slice.next_position;
                }
            }
        }

        if !had_snapshot && replayed == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }

        tracing::debug!(
            aggregate = id,
            version = %root.version(),
            replayed,
            from_snapshot = had_snapshot,
            "aggregate loaded"
        );
        self.uow.attach(root)
    }

    /// Commit every tracked aggregate's uncommitted events.
    ///
    /// Each changed root is appended to its stream with an expected
    /// version equal to the version *before* its new events. On success
    /// the root's version advances, its change list clears, and the
    /// snapshotter (if configured) is consulted — best-effort, never
    /// failing the save. Roots without changes are untouched.
    ///
    /// Appends are per stream: if one aggregate conflicts, earlier
    /// aggregates in the same save remain committed, and the failed root
    /// keeps its changes for a caller-driven retry.
    ///
    /// # Errors
    ///
    /// - [`RepositoryError::Conflict`] when another writer got there
    ///   first. Not retried here.
    /// - [`RepositoryError::Decode`] when an event fails to encode.
    /// - [`RepositoryError::StreamDeleted`] / [`RepositoryError::Log`]
    ///   for log failures.
    pub async fn save(&mut self) -> Result<(), RepositoryError>
    where
        A: Serialize,
    {
        for id in self.uow.changed_ids() {
            let Some(root) = self.uow.get_mut(&id) else {
                continue;
            };

            let expected = if root.version().is_initial() {
                ExpectedVersion::NoStream
            } else {
                ExpectedVersion::Exact(root.version())
            };

            let mut batch = Vec::with_capacity(root.changes().len());
            for event in root.changes() {
                batch.push(self.codec.encode(event)?);
            }

            let first_new = root.version().value() + 1;
            let stream = self.namer.stream(&id);
            let new_version = self.log.append(stream, expected, batch).await?;
            root.mark_committed(new_version);

            tracing::info!(
                aggregate = %id,
                version = %new_version,
                appended = new_version.value() + 1 - first_new,
                "changes committed"
            );

            if let Some(snapshotter) = &self.snapshotter {
                snapshotter
                    .after_commit(&*root, first_new..=new_version.value())
                    .await;
            }
        }
        Ok(())
    }
}

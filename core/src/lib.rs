//! # Replay Core
//!
//! Core traits and types for event-sourced aggregate persistence.
//!
//! Long-lived aggregates are reconstructed by replaying their append-only
//! event streams, accelerated by periodically materialized snapshots, and
//! projected into read-optimized views with resumable checkpoints.
//!
//! ## Core concepts
//!
//! - **Stream**: an append-only, strictly ordered record sequence, named
//!   `"{AggregateTypeName}-{identifier}"`
//! - **Aggregate**: in-memory state folded from applied events, wrapped by
//!   an [`AggregateRoot`](aggregate::AggregateRoot) that tracks uncommitted
//!   changes
//! - **Repository / UnitOfWork**: the load → mutate → save discipline with
//!   optimistic concurrency at save time
//! - **Snapshot**: a point-in-time state materialization that lets a load
//!   skip replaying earlier history; always an optimization, never the
//!   source of truth
//! - **Checkpoint**: the last stream position a projection set has durably
//!   processed
//!
//! ## Collaborators
//!
//! The event log itself and the checkpoint store live behind the
//! [`EventLog`](log::EventLog) and [`CheckpointStore`](checkpoint::CheckpointStore)
//! traits; real backends and in-memory fakes are interchangeable. No
//! component reads ambient globals — every collaborator and tunable is
//! passed in at construction.
//!
//! ## Example
//!
//! ```ignore
//! use replay_core::prelude::*;
//!
//! let namer = StreamNamer::new(Product::TYPE_NAME);
//! let mut repository = Repository::<Product>::new(log.clone(), Arc::new(BincodeCodec))
//!     .with_snapshots(SnapshotReader::new(log.clone(), namer))
//!     .with_snapshotter(Snapshotter::new(
//!         log,
//!         namer,
//!         SnapshotPolicy::every(5),
//!         Arc::new(SystemClock),
//!     ));
//!
//! let product = repository.load("42").await?;
//! product.record(ProductEvent::VariantAdded { variant_id: "v-1".into() });
//! repository.save().await?;
//! ```

pub mod aggregate;
pub mod checkpoint;
pub mod command;
pub mod environment;
pub mod event;
pub mod log;
pub mod naming;
pub mod projection;
pub mod repository;
pub mod snapshot;
pub mod stream;

/// Convenience re-exports of the types most call sites need.
pub mod prelude {
    pub use crate::aggregate::{Aggregate, AggregateRoot};
    pub use crate::checkpoint::{Checkpoint, CheckpointStore};
    pub use crate::command::{CommandHandler, Dispatcher};
    pub use crate::environment::{Clock, SystemClock};
    pub use crate::event::{BincodeCodec, Event, EventCodec, EventData, RecordedEvent};
    pub use crate::log::{EventLog, Slice, SliceRead};
    pub use crate::naming::StreamNamer;
    pub use crate::projection::Projection;
    pub use crate::repository::{Repository, RepositoryError, UnitOfWork};
    pub use crate::snapshot::{Snapshot, SnapshotPolicy, SnapshotReader, Snapshotter};
    pub use crate::stream::{ExpectedVersion, StreamId, Version};
}

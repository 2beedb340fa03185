//! Checkpoints: durable projection progress.
//!
//! A checkpoint records the last stream position a projection set has
//! fully processed, so a restart resumes from there instead of replaying
//! the whole history. The store behind the trait (a document database, a
//! key-value store, an in-memory fake) owns durability; the runner keeps
//! only an advisory in-memory copy.
//!
//! Invariant: positions per projection set are monotonically
//! non-decreasing. The runner only ever saves positions it has fully
//! applied, in order, and at most one runner per set may be active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Error from checkpoint persistence.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// The checkpoint backend failed.
    #[error("Checkpoint store error: {0}")]
    Storage(String),
}

/// The last stream position a projection set has durably processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 1-based position of the last fully-applied record.
    pub position: u64,
    /// When this checkpoint was written.
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint at the given position.
    #[must_use]
    pub const fn new(position: u64, updated_at: DateTime<Utc>) -> Self {
        Self {
            position,
            updated_at,
        }
    }
}

/// Durable mapping from projection-set name to checkpoint.
///
/// # Dyn compatibility
///
/// Boxed futures keep the trait usable as `Arc<dyn CheckpointStore>`,
/// shared between runners and their supervisors.
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint for a projection set.
    ///
    /// `Ok(None)` means the set has never checkpointed: catch-up starts
    /// from the beginning of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the backend fails.
    fn load(
        &self,
        projection: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Checkpoint>, CheckpointError>> + Send + '_>>;

    /// Persist the checkpoint for a projection set.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the backend fails.
    fn save(
        &self,
        projection: &str,
        checkpoint: Checkpoint,
    ) -> Pin<Box<dyn Future<Output = Result<(), CheckpointError>> + Send + '_>>;
}

//! The projection runner: catch up, go live, checkpoint as you go.

use replay_core::checkpoint::{Checkpoint, CheckpointStore};
use replay_core::environment::Clock;
use replay_core::event::RecordedEvent;
use replay_core::log::{EventLog, SliceRead};
use replay_core::projection::{Projection, ProjectionError};
use replay_core::stream::StreamId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Records fetched per forward read while catching up.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// How often a live runner polls the source stream for new records.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Lifecycle of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Not processing. The initial state, and the state after shutdown
    /// or a fault.
    Stopped,
    /// Replaying history between the checkpoint and the stream's end.
    CatchingUp,
    /// Caught up; polling for new records.
    Live,
}

/// Drives a set of projections over one source stream, sharing one
/// checkpoint.
///
/// All projections registered with a runner advance together: the
/// checkpoint moves only past records every matching handler has
/// applied. A handler failure halts the whole set at that position,
/// after persisting the last fully-applied position, so a restart
/// resumes exactly at the faulted record. Other runners and the write
/// path are unaffected.
pub struct ProjectionRunner {
    name: String,
    stream: StreamId,
    log: Arc<dyn EventLog>,
    checkpoints: Arc<dyn CheckpointStore>,
    clock: Arc<dyn Clock>,
    projections: Vec<Arc<dyn Projection>>,
    routes: HashMap<String, Vec<usize>>,
    batch_size: usize,
    poll_interval: Duration,
    position: u64,
    state: RunnerState,
}

impl ProjectionRunner {
    /// Create a runner for one projection set over one source stream.
    ///
    /// `name` keys the shared checkpoint; two runners with the same name
    /// would fight over it, so at most one may be active per name.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        stream: StreamId,
        log: Arc<dyn EventLog>,
        checkpoints: Arc<dyn CheckpointStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            stream,
            log,
            checkpoints,
            clock,
            projections: Vec::new(),
            routes: HashMap::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            position: 0,
            state: RunnerState::Stopped,
        }
    }

    /// Register a projection with this runner's set.
    ///
    /// Its [`event_types`](Projection::event_types) are resolved into the
    /// dispatch table now; records with other tags never reach it.
    #[must_use]
    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        let index = self.projections.len();
        for &tag in projection.event_types() {
            self.routes.entry(tag.to_string()).or_default().push(index);
        }
        self.projections.push(projection);
        self
    }

    /// Override the catch-up read batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Override the live polling interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The projection-set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RunnerState {
        self.state
    }

    /// Last stream position this runner has fully applied. Zero means
    /// nothing processed yet.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Replay from the durable checkpoint to the current end of the
    /// stream, then stop.
    ///
    /// Returns the last position applied (the checkpoint's position, or
    /// zero when the stream is empty and nothing was ever processed).
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Fault`] when a handler fails; the
    /// checkpoint holds the last fully-applied position, so the faulted
    /// record is the first one seen on restart. Storage and checkpoint
    /// failures surface as their own variants.
    pub async fn catch_up(&mut self) -> Result<u64, ProjectionError> {
        self.load_checkpoint().await?;
        self.state = RunnerState::CatchingUp;
        tracing::info!(
            runner = %self.name,
            stream = %self.stream,
            from = self.position + 1,
            "projection catch-up starting"
        );
        let drained = self.drain().await;
        self.state = RunnerState::Stopped;
        drained?;
        tracing::info!(
            runner = %self.name,
            position = self.position,
            "projection catch-up complete"
        );
        Ok(self.position)
    }

    /// Catch up, then stay live: poll the stream for new records until
    /// `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// # Errors
    ///
    /// Same contract as [`catch_up`](Self::catch_up); an error while
    /// live also halts the runner with the checkpoint already at the
    /// last fully-applied position.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ProjectionError> {
        self.load_checkpoint().await?;
        self.state = RunnerState::CatchingUp;
        if let Err(error) = self.drain().await {
            self.state = RunnerState::Stopped;
            return Err(error);
        }

        self.state = RunnerState::Live;
        tracing::info!(
            runner = %self.name,
            stream = %self.stream,
            position = self.position,
            "projection runner live"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                () = tokio::time::sleep(self.poll_interval) => {
                    if let Err(error) = self.drain().await {
                        self.state = RunnerState::Stopped;
                        return Err(error);
                    }
                }
            }
        }

        self.state = RunnerState::Stopped;
        tracing::info!(
            runner = %self.name,
            position = self.position,
            "projection runner stopped"
        );
        Ok(())
    }

    /// Prime `self.position` from the durable checkpoint.
    async fn load_checkpoint(&mut self) -> Result<(), ProjectionError> {
        let loaded = self
            .checkpoints
            .load(&self.name)
            .await
            .map_err(|e| ProjectionError::Checkpoint(e.to_string()))?;
        self.position = loaded.map_or(0, |checkpoint| checkpoint.position);
        Ok(())
    }

    /// Read and apply batches from `position + 1` until the end of the
    /// stream, persisting the checkpoint after each batch.
    async fn drain(&mut self) -> Result<(), ProjectionError> {
        loop {
            let read = self
                .log
                .read_forward(self.stream.clone(), self.position + 1, self.batch_size)
                .await
                .map_err(|e| ProjectionError::Storage(e.to_string()))?;

            let slice = match read {
                SliceRead::Events(slice) => slice,
                // Nothing written yet; live polling will pick it up.
                SliceRead::NoStream => return Ok(()),
                SliceRead::Deleted => {
                    return Err(ProjectionError::Storage(format!(
                        "source stream {} is deleted",
                        self.stream
                    )));
                }
            };

            let batch_start = self.position;
            let mut fault = None;
            for record in &slice.events {
                match self.dispatch(record).await {
                    Ok(()) => self.position = record.position,
                    Err(error) => {
                        fault = Some(error);
                        break;
                    }
                }
            }

            if self.position > batch_start {
                self.save_checkpoint().await?;
            }
            if let Some(error) = fault {
                return Err(error);
            }
            if slice.end_of_stream {
                return Ok(());
            }
        }
    }

    /// Hand one record to every projection that declared its type tag.
    async fn dispatch(&self, record: &RecordedEvent) -> Result<(), ProjectionError> {
        let Some(indexes) = self.routes.get(&record.event_type) else {
            tracing::trace!(
                runner = %self.name,
                record = %record,
                "no projection handles this event type, skipping"
            );
            return Ok(());
        };

        for &index in indexes {
            let projection = &self.projections[index];
            if let Err(error) = projection.apply(record).await {
                tracing::error!(
                    runner = %self.name,
                    projection = projection.name(),
                    record = %record,
                    error = %error,
                    "projection handler failed, halting set"
                );
                return Err(ProjectionError::Fault {
                    projection: projection.name().to_string(),
                    position: record.position,
                    reason: error.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn save_checkpoint(&self) -> Result<(), ProjectionError> {
        let checkpoint = Checkpoint::new(self.position, self.clock.now());
        self.checkpoints
            .save(&self.name, checkpoint)
            .await
            .map_err(|e| ProjectionError::Checkpoint(e.to_string()))?;
        tracing::debug!(
            runner = %self.name,
            position = self.position,
            "checkpoint saved"
        );
        Ok(())
    }
}

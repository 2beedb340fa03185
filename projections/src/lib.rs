//! # Replay Projections
//!
//! The catch-up machinery that keeps read models current with an event
//! stream.
//!
//! A [`ProjectionRunner`] owns a set of [`Projection`](replay_core::projection::Projection)
//! handlers that share one durable checkpoint. Started, it loads the
//! checkpoint, replays the source stream from the next position in
//! batches, dispatches each record to the handlers that declared its
//! event type, and persists progress per batch. Once it reaches the end
//! of the stream it goes live, polling for new records until asked to
//! shut down.
//!
//! Delivery is at-least-once; checkpoint advancement is exactly-once.
//! Handlers must tolerate replays of the tail after a crash.
//!
//! ## Example
//!
//! ```ignore
//! let mut runner = ProjectionRunner::new(
//!     "product-views",
//!     StreamId::new("Product-42"),
//!     log,
//!     checkpoints,
//!     Arc::new(SystemClock),
//! )
//! .with_projection(Arc::new(ProductView::default()));
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! tokio::spawn(async move { runner.run(shutdown_rx).await });
//! // later:
//! let _ = shutdown_tx.send(true);
//! ```

pub mod runner;

pub use runner::{DEFAULT_BATCH_SIZE, DEFAULT_POLL_INTERVAL, ProjectionRunner, RunnerState};

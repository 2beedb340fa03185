//! Projections: read models folded from the event stream.
//!
//! A projection consumes recorded events in stream order and maintains a
//! read-optimized view somewhere (a document store, a search index, an
//! in-memory map). Projections declare at registration time which event
//! type tags they handle; the runner dispatches by tag and silently skips
//! tags no projection declared — an unhandled type is a non-event, not an
//! error.
//!
//! Delivery into `apply` is at-least-once: a crash between apply and
//! checkpoint write replays the tail on restart, so handlers must be
//! idempotent. Checkpoint advancement is exactly-once — that is the
//! invariant the runner maintains.

use crate::event::RecordedEvent;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised while projecting events.
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// Read-model storage failed.
    #[error("Projection storage error: {0}")]
    Storage(String),

    /// An event payload the projection handles failed to decode.
    #[error("Projection decode error: {0}")]
    Decode(String),

    /// Checkpoint persistence failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// A handler raised an unrecoverable error. The runner halts the
    /// affected projection set at this position; other sets and the write
    /// path are unaffected.
    #[error("Projection {projection} faulted at position {position}: {reason}")]
    Fault {
        /// The projection that failed.
        projection: String,
        /// The stream position of the event that could not be applied.
        position: u64,
        /// Underlying failure.
        reason: String,
    },
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

/// A read-model handler registered with a projection runner.
///
/// # Dyn compatibility
///
/// Boxed futures keep the trait usable as `Arc<dyn Projection>`, so a
/// runner can hold a heterogeneous set of projections.
///
/// # Examples
///
/// ```
/// use replay_core::event::RecordedEvent;
/// use replay_core::projection::{Projection, Result};
/// use std::future::Future;
/// use std::pin::Pin;
///
/// struct ActiveProductCount;
///
/// impl Projection for ActiveProductCount {
///     fn name(&self) -> &str {
///         "active_product_count"
///     }
///
///     fn event_types(&self) -> &[&'static str] {
///         &["ProductCreated.v1"]
///     }
///
///     fn apply(
///         &self,
///         _record: &RecordedEvent,
///     ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
///         Box::pin(async { Ok(()) })
///     }
/// }
/// ```
pub trait Projection: Send + Sync {
    /// Unique name of this projection, used in logs and diagnostics.
    fn name(&self) -> &str;

    /// The event type tags this projection handles.
    ///
    /// Resolved once at registration into the runner's dispatch table;
    /// records with other tags never reach [`apply`](Projection::apply).
    fn event_types(&self) -> &[&'static str];

    /// Apply one record to the read model.
    ///
    /// Called in strictly increasing position order for the tags declared
    /// in [`event_types`](Projection::event_types). Must be idempotent
    /// under at-least-once replay.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] when the record cannot be applied; the
    /// runner treats this as a fault and halts the projection set.
    fn apply(
        &self,
        record: &RecordedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

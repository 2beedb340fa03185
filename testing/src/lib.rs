//! # Replay Testing
//!
//! In-memory collaborator implementations and shared fixtures for testing
//! event-sourced systems built on `replay-core`.
//!
//! This crate provides:
//! - [`mocks::InMemoryEventLog`]: a full [`EventLog`](replay_core::log::EventLog)
//!   with distinct not-found/deleted statuses and expected-version checks
//! - [`mocks::InMemoryCheckpointStore`]: checkpoint persistence in a map
//! - [`mocks::FixedClock`]: deterministic time
//! - [`fixtures`]: the `Product` aggregate, its events, and command
//!   handlers used across the workspace's integration tests
//!
//! ## Example
//!
//! ```
//! use replay_testing::mocks::InMemoryEventLog;
//! use replay_core::prelude::*;
//! use std::sync::Arc;
//!
//! let log = Arc::new(InMemoryEventLog::new());
//! let read = tokio_test::block_on(
//!     log.read_forward(StreamId::new("Product-42"), 1, 100)
//! ).unwrap();
//! assert!(matches!(read, SliceRead::NoStream));
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

pub mod fixtures;
pub mod mocks;

pub use mocks::{FixedClock, InMemoryCheckpointStore, InMemoryEventLog, test_clock};

/// Install a human-readable tracing subscriber for a test run.
///
/// Safe to call from multiple tests; only the first call installs.
/// Filtering honors `RUST_LOG`, defaulting to `info`.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_test_writer()
        .try_init()
        .ok();
}

//! Integration tests for the projection runner: catch-up, resume,
//! dispatch filtering, fault handling, and live polling.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use replay_core::checkpoint::{Checkpoint, CheckpointStore};
use replay_core::environment::Clock;
use replay_core::event::{BincodeCodec, EventCodec, RecordedEvent};
use replay_core::log::EventLog;
use replay_core::projection::{Projection, ProjectionError};
use replay_core::stream::{ExpectedVersion, StreamId};
use replay_projections::{ProjectionRunner, RunnerState};
use replay_testing::fixtures::ProductEvent;
use replay_testing::mocks::{InMemoryCheckpointStore, InMemoryEventLog, test_clock};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A projection that records which positions reached it, and can be
/// told to fail at one position to simulate a read-model outage.
struct Recording {
    name: &'static str,
    types: &'static [&'static str],
    applied: Mutex<Vec<u64>>,
    fail_at: Option<u64>,
}

impl Recording {
    fn handling(name: &'static str, types: &'static [&'static str]) -> Arc<Self> {
        Arc::new(Self {
            name,
            types,
            applied: Mutex::new(Vec::new()),
            fail_at: None,
        })
    }

    fn failing_at(name: &'static str, types: &'static [&'static str], position: u64) -> Arc<Self> {
        Arc::new(Self {
            name,
            types,
            applied: Mutex::new(Vec::new()),
            fail_at: Some(position),
        })
    }

    fn applied(&self) -> Vec<u64> {
        self.applied.lock().unwrap().clone()
    }
}

impl Projection for Recording {
    fn name(&self) -> &str {
        self.name
    }

    fn event_types(&self) -> &[&'static str] {
        self.types
    }

    fn apply(
        &self,
        record: &RecordedEvent,
    ) -> Pin<Box<dyn Future<Output = replay_core::projection::Result<()>> + Send + '_>> {
        let position = record.position;
        Box::pin(async move {
            if self.fail_at == Some(position) {
                return Err(ProjectionError::Storage(
                    "simulated read-model outage".to_string(),
                ));
            }
            self.applied.lock().unwrap().push(position);
            Ok(())
        })
    }
}

const ALL_PRODUCT_TYPES: &[&str] = &[
    "ProductCreated.v1",
    "VariantAddedToProduct.v1",
    "ContentAddedToProduct.v1",
];

/// Append a created event followed by `variants` variant events.
async fn seed_product(log: &InMemoryEventLog, stream: &StreamId, variants: usize) {
    let codec = BincodeCodec::new();
    let mut events = vec![
        codec
            .encode(&ProductEvent::Created {
                product_id: "42".to_string(),
            })
            .unwrap(),
    ];
    for i in 0..variants {
        events.push(
            codec
                .encode(&ProductEvent::VariantAdded {
                    variant_id: format!("v-{i}"),
                })
                .unwrap(),
        );
    }
    log.append(stream.clone(), ExpectedVersion::Any, events)
        .await
        .unwrap();
}

fn runner_over(
    log: Arc<InMemoryEventLog>,
    checkpoints: Arc<InMemoryCheckpointStore>,
    stream: StreamId,
) -> ProjectionRunner {
    ProjectionRunner::new("product-views", stream, log, checkpoints, Arc::new(test_clock()))
}

#[tokio::test]
async fn catch_up_applies_everything_and_checkpoints_at_stream_end() {
    let log = Arc::new(InMemoryEventLog::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let stream = StreamId::new("Product-42");
    seed_product(&log, &stream, 6).await;

    let view = Recording::handling("product_view", ALL_PRODUCT_TYPES);
    let mut runner = runner_over(log, checkpoints.clone(), stream)
        .with_projection(view.clone());

    let position = runner.catch_up().await.unwrap();

    assert_eq!(position, 7);
    assert_eq!(view.applied(), vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(checkpoints.position("product-views"), Some(7));
    assert_eq!(runner.state(), RunnerState::Stopped);
}

#[tokio::test]
async fn catch_up_resumes_after_an_existing_checkpoint() {
    let log = Arc::new(InMemoryEventLog::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let stream = StreamId::new("Product-42");
    seed_product(&log, &stream, 6).await;
    checkpoints
        .save("product-views", Checkpoint::new(4, test_clock().now()))
        .await
        .unwrap();

    let view = Recording::handling("product_view", ALL_PRODUCT_TYPES);
    let mut runner = runner_over(log, checkpoints.clone(), stream)
        .with_projection(view.clone());

    let position = runner.catch_up().await.unwrap();

    assert_eq!(position, 7);
    assert_eq!(view.applied(), vec![5, 6, 7]);
    assert_eq!(checkpoints.position("product-views"), Some(7));
}

#[tokio::test]
async fn rerunning_a_caught_up_set_applies_nothing_new() {
    let log = Arc::new(InMemoryEventLog::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let stream = StreamId::new("Product-42");
    seed_product(&log, &stream, 3).await;

    let view = Recording::handling("product_view", ALL_PRODUCT_TYPES);
    let mut runner = runner_over(log, checkpoints.clone(), stream)
        .with_projection(view.clone());

    runner.catch_up().await.unwrap();
    let applied_once = view.applied();
    runner.catch_up().await.unwrap();

    assert_eq!(view.applied(), applied_once);
}

#[tokio::test]
async fn unhandled_event_types_still_advance_the_checkpoint() {
    let log = Arc::new(InMemoryEventLog::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let stream = StreamId::new("Product-42");
    seed_product(&log, &stream, 4).await;

    let creations_only = Recording::handling("creation_counter", &["ProductCreated.v1"]);
    let mut runner = runner_over(log, checkpoints.clone(), stream)
        .with_projection(creations_only.clone());

    let position = runner.catch_up().await.unwrap();

    assert_eq!(position, 5);
    assert_eq!(creations_only.applied(), vec![1]);
    assert_eq!(checkpoints.position("product-views"), Some(5));
}

#[tokio::test]
async fn a_handler_fault_halts_at_the_last_fully_applied_position() {
    let log = Arc::new(InMemoryEventLog::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let stream = StreamId::new("Product-42");
    seed_product(&log, &stream, 4).await;

    let flaky = Recording::failing_at("flaky_view", ALL_PRODUCT_TYPES, 3);
    let mut runner = runner_over(log, checkpoints.clone(), stream)
        .with_projection(flaky.clone());

    let error = runner.catch_up().await.unwrap_err();

    let ProjectionError::Fault {
        projection,
        position,
        ..
    } = error
    else {
        panic!("expected a fault, got {error}");
    };
    assert_eq!(projection, "flaky_view");
    assert_eq!(position, 3);
    assert_eq!(flaky.applied(), vec![1, 2]);
    assert_eq!(checkpoints.position("product-views"), Some(2));
    assert_eq!(runner.state(), RunnerState::Stopped);

    // A restart resumes exactly at the faulted record.
    let error = runner.catch_up().await.unwrap_err();
    assert!(matches!(error, ProjectionError::Fault { position: 3, .. }));
    assert_eq!(flaky.applied(), vec![1, 2]);
}

#[tokio::test]
async fn small_batches_cover_the_whole_stream() {
    let log = Arc::new(InMemoryEventLog::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let stream = StreamId::new("Product-42");
    seed_product(&log, &stream, 5).await;

    let view = Recording::handling("product_view", ALL_PRODUCT_TYPES);
    let mut runner = runner_over(log, checkpoints.clone(), stream)
        .with_projection(view.clone())
        .with_batch_size(2);

    let position = runner.catch_up().await.unwrap();

    assert_eq!(position, 6);
    assert_eq!(view.applied(), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn two_projections_in_one_set_share_the_checkpoint() {
    let log = Arc::new(InMemoryEventLog::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let stream = StreamId::new("Product-42");
    seed_product(&log, &stream, 2).await;

    let everything = Recording::handling("product_view", ALL_PRODUCT_TYPES);
    let creations_only = Recording::handling("creation_counter", &["ProductCreated.v1"]);
    let mut runner = runner_over(log, checkpoints.clone(), stream)
        .with_projection(everything.clone())
        .with_projection(creations_only.clone());

    runner.catch_up().await.unwrap();

    assert_eq!(everything.applied(), vec![1, 2, 3]);
    assert_eq!(creations_only.applied(), vec![1]);
    assert_eq!(checkpoints.position("product-views"), Some(3));
}

#[tokio::test]
async fn live_runner_picks_up_new_appends_then_shuts_down() {
    let log = Arc::new(InMemoryEventLog::new());
    let checkpoints = Arc::new(InMemoryCheckpointStore::new());
    let stream = StreamId::new("Product-42");
    seed_product(&log, &stream, 2).await;

    let view = Recording::handling("product_view", ALL_PRODUCT_TYPES);
    let mut runner = runner_over(log.clone(), checkpoints.clone(), stream.clone())
        .with_projection(view.clone())
        .with_poll_interval(Duration::from_millis(10));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let codec = BincodeCodec::new();
    let late = ProductEvent::ContentAdded {
        content_id: "c-1".to_string(),
    };
    log.append(
        stream,
        ExpectedVersion::Any,
        vec![codec.encode(&late).unwrap()],
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(view.applied(), vec![1, 2, 3, 4]);
    assert_eq!(checkpoints.position("product-views"), Some(4));
}

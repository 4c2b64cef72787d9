//! Integration tests for the delivery state machine.
//!
//! Drives the worker against the in-memory queue and a wiremock destination,
//! advancing a test clock through the backoff schedule instead of sleeping.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use hookrelay_core::{
    AuthScheme, BackoffSchedule, ConsumerBinding, Destination, DurableQueue, Envelope,
    InMemoryQueue, TestClock,
};
use hookrelay_delivery::{DeliveryConfig, DeliveryEngine};
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

const SUBJECT: &str = "webhook.dispatch";
const BACKOFF_STEP: Duration = Duration::from_secs(2);

struct TestRig {
    queue: Arc<InMemoryQueue>,
    clock: TestClock,
    engine: DeliveryEngine,
}

fn rig(max_deliver: u32) -> TestRig {
    let clock = TestClock::new();
    let queue = Arc::new(InMemoryQueue::with_clock(Arc::new(clock.clone())));

    let config = DeliveryConfig {
        consumer: ConsumerBinding {
            subject: SUBJECT.to_owned(),
            max_deliver,
            backoff: BackoffSchedule::new(vec![BACKOFF_STEP]),
            ..ConsumerBinding::default()
        },
        ..DeliveryConfig::default()
    };

    let engine = DeliveryEngine::with_clock(
        queue.clone() as Arc<dyn DurableQueue>,
        config,
        Arc::new(clock.clone()),
    )
    .expect("engine construction");

    TestRig { queue, clock, engine }
}

async fn publish_envelope(queue: &InMemoryQueue, url: String, auth: AuthScheme, body: &[u8]) {
    let envelope = Envelope::new(
        Destination { url, auth },
        Bytes::copy_from_slice(body),
        "x-dest",
    );
    queue
        .publish(SUBJECT, envelope.to_bytes().expect("serialize envelope"))
        .await
        .expect("publish");
}

#[tokio::test]
async fn successful_delivery_is_acknowledged() {
    let rig = rig(4);
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/hook"))
        .and(matchers::header("Authorization", "Bearer tok123"))
        .and(matchers::body_bytes(br#"{"a":1}"#.to_vec()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    publish_envelope(
        &rig.queue,
        format!("{}/hook", mock_server.uri()),
        AuthScheme::Bearer("tok123".to_owned()),
        br#"{"a":1}"#,
    )
    .await;

    assert!(rig.engine.process_next().await.expect("process"));

    // Acknowledged means permanently removed.
    assert_eq!(rig.queue.depth(SUBJECT).await, 0);
    let stats = rig.engine.stats().await;
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.retryable_failures, 0);
}

#[tokio::test]
async fn failure_leaves_message_for_redelivery_after_backoff() {
    let rig = rig(4);
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    publish_envelope(&rig.queue, mock_server.uri(), AuthScheme::None, b"{}").await;

    assert!(rig.engine.process_next().await.expect("process"));
    assert_eq!(rig.queue.depth(SUBJECT).await, 1);

    // Invisible until the backoff elapses.
    assert!(!rig.engine.process_next().await.expect("process"));

    rig.clock.advance(BACKOFF_STEP);
    assert!(rig.engine.process_next().await.expect("process"));
    assert_eq!(rig.engine.stats().await.retryable_failures, 2);
}

#[tokio::test]
async fn recovers_on_fourth_attempt_under_max_deliver_four() {
    let rig = rig(4);
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .expect(3)
        .mount(&mock_server)
        .await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    publish_envelope(&rig.queue, mock_server.uri(), AuthScheme::None, b"{}").await;

    for _ in 0..3 {
        assert!(rig.engine.process_next().await.expect("process"));
        rig.clock.advance(BACKOFF_STEP);
    }
    assert!(rig.engine.process_next().await.expect("process"));

    // Fourth attempt succeeded and was acknowledged; nothing left to claim.
    assert_eq!(rig.queue.depth(SUBJECT).await, 0);
    rig.clock.advance(Duration::from_secs(600));
    assert!(!rig.engine.process_next().await.expect("process"));

    let stats = rig.engine.stats().await;
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.retryable_failures, 3);
}

#[tokio::test]
async fn persistent_failure_exhausts_after_max_deliver_attempts() {
    let rig = rig(4);
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&mock_server)
        .await;

    publish_envelope(&rig.queue, mock_server.uri(), AuthScheme::None, b"{}").await;

    for _ in 0..4 {
        assert!(rig.engine.process_next().await.expect("process"));
        rig.clock.advance(BACKOFF_STEP);
    }

    // Budget consumed; the message is silently dropped.
    assert!(!rig.engine.process_next().await.expect("process"));
    assert_eq!(rig.queue.depth(SUBJECT).await, 0);
    assert_eq!(rig.engine.stats().await.retryable_failures, 4);
}

#[tokio::test]
async fn client_errors_are_retried_like_server_errors() {
    let rig = rig(4);
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    publish_envelope(&rig.queue, mock_server.uri(), AuthScheme::None, b"{}").await;

    assert!(rig.engine.process_next().await.expect("process"));
    assert_eq!(rig.queue.depth(SUBJECT).await, 1);

    rig.clock.advance(BACKOFF_STEP);
    assert!(rig.engine.process_next().await.expect("process"));
    assert_eq!(rig.queue.depth(SUBJECT).await, 0);
}

#[tokio::test]
async fn transport_failure_is_a_retryable_outcome() {
    let rig = rig(4);

    // Discard port; connection will be refused.
    publish_envelope(&rig.queue, "http://127.0.0.1:9/hook".to_owned(), AuthScheme::None, b"{}")
        .await;

    assert!(rig.engine.process_next().await.expect("process"));

    assert_eq!(rig.queue.depth(SUBJECT).await, 1);
    assert_eq!(rig.engine.stats().await.retryable_failures, 1);
}

#[tokio::test]
async fn corrupt_envelope_is_rejected_without_an_outbound_call() {
    let rig = rig(4);
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    rig.queue.publish(SUBJECT, Bytes::from_static(b"not an envelope")).await.expect("publish");

    assert!(rig.engine.process_next().await.expect("process"));

    // Terminal removal: never redelivered, even after any amount of time.
    rig.clock.advance(Duration::from_secs(600));
    assert!(!rig.engine.process_next().await.expect("process"));
    assert_eq!(rig.queue.depth(SUBJECT).await, 0);
    assert_eq!(rig.engine.stats().await.rejected, 1);
}

#[tokio::test]
async fn corrupt_envelope_does_not_block_siblings() {
    let rig = rig(4);
    let mock_server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    rig.queue.publish(SUBJECT, Bytes::from_static(b"garbage")).await.expect("publish");
    publish_envelope(&rig.queue, mock_server.uri(), AuthScheme::None, b"{}").await;

    assert!(rig.engine.process_next().await.expect("process"));
    assert!(rig.engine.process_next().await.expect("process"));

    let stats = rig.engine.stats().await;
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.delivered, 1);
}

#[tokio::test]
async fn engine_lifecycle_starts_and_drains_workers() {
    let mut rig = rig(4);

    rig.engine.start().await;
    assert_eq!(rig.engine.stats().await.active_workers, 4);

    rig.engine.shutdown().await.expect("graceful shutdown");
}

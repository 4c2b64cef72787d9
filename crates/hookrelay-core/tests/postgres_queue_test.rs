//! Integration tests for the PostgreSQL-backed queue.
//!
//! These require a reachable database; set `DATABASE_URL` and run with
//! `cargo test -- --ignored`.

use std::time::Duration;

use bytes::Bytes;
use hookrelay_core::{BackoffSchedule, ConsumerBinding, DurableQueue, PostgresQueue};
use sqlx::postgres::PgPoolOptions;

async fn connect() -> sqlx::PgPool {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/hookrelay_test".to_owned());
    PgPoolOptions::new().max_connections(2).connect(&url).await.expect("database connection")
}

fn binding(subject: &str) -> ConsumerBinding {
    ConsumerBinding {
        subject: subject.to_owned(),
        max_deliver: 2,
        // Zero-length waits keep redelivery immediate so the test does not
        // sleep through a schedule.
        backoff: BackoffSchedule::new(vec![Duration::ZERO]),
        ..ConsumerBinding::default()
    }
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance (set DATABASE_URL)"]
async fn publish_claim_ack_cycle() {
    let pool = connect().await;
    PostgresQueue::ensure_schema(&pool).await.expect("schema");
    let queue = PostgresQueue::new(pool);
    let binding = binding("it.publish_claim_ack");

    queue.publish(&binding.subject, Bytes::from_static(b"payload")).await.expect("publish");

    let message = queue.claim(&binding).await.expect("claim").expect("claimable message");
    assert_eq!(message.payload, Bytes::from_static(b"payload"));
    assert_eq!(message.deliveries, 1);

    queue.ack(message.id).await.expect("ack");
    assert!(queue.claim(&binding).await.expect("claim").is_none());
}

#[tokio::test]
#[ignore = "requires a PostgreSQL instance (set DATABASE_URL)"]
async fn unacked_message_is_redelivered_then_dropped() {
    let pool = connect().await;
    PostgresQueue::ensure_schema(&pool).await.expect("schema");
    let queue = PostgresQueue::new(pool);
    let binding = binding("it.redelivery");

    queue.publish(&binding.subject, Bytes::from_static(b"payload")).await.expect("publish");

    let first = queue.claim(&binding).await.expect("claim").expect("first delivery");
    let second = queue.claim(&binding).await.expect("claim").expect("second delivery");
    assert_eq!(first.id, second.id);
    assert_eq!(second.deliveries, 2);

    // Budget of two deliveries consumed without an ack.
    assert!(queue.claim(&binding).await.expect("claim").is_none());
}

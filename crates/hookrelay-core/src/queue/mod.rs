//! Durable queue abstraction.
//!
//! The queue is an injected capability: a persistent, subject-addressed log
//! with durable consumer bindings, explicit acknowledgement, a bounded
//! redelivery count, and a backoff schedule between redeliveries. The relay
//! core never manages retry state itself; it publishes, claims, and either
//! acknowledges or lets a claim lapse back onto the queue.
//!
//! Two implementations ship with the crate: [`InMemoryQueue`] for tests and
//! single-process deployments, and [`PostgresQueue`] for durable production
//! use. Anything honoring the contract documented on [`DurableQueue`] can be
//! substituted.

pub mod backoff;
pub mod memory;
pub mod postgres;

use std::{fmt, future::Future, pin::Pin, time::Duration};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use backoff::BackoffSchedule;
pub use memory::InMemoryQueue;
pub use postgres::PostgresQueue;

/// Subject every envelope is published under.
pub const DELIVERY_SUBJECT: &str = "webhook.dispatch";

/// Durable consumer group name the delivery workers bind to.
pub const DELIVERY_CONSUMER: &str = "webhook-deliverer";

/// Result type alias for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors surfaced by queue implementations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing store failed.
    #[error("queue storage error: {message}")]
    Storage {
        /// Backend error message.
        message: String,
    },

    /// An ack or reject referenced a message the queue no longer holds.
    #[error("message {id} is not held by the queue")]
    UnknownMessage {
        /// Identifier the operation referenced.
        id: MessageId,
    },
}

impl QueueError {
    /// Creates a storage error from a backend message.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        Self::storage(err.to_string())
    }
}

/// Strongly-typed queue message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Creates a new random message ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Durable consumer binding: which subject to consume and under what
/// redelivery contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerBinding {
    /// Subject the binding consumes.
    pub subject: String,

    /// Durable name identifying the consumer group.
    pub durable_name: String,

    /// Visibility window for a claim when the backoff schedule is empty.
    pub ack_wait: Duration,

    /// Total delivery attempts before the queue stops redelivering.
    pub max_deliver: u32,

    /// Waits between successive deliveries of the same message.
    pub backoff: BackoffSchedule,
}

impl Default for ConsumerBinding {
    fn default() -> Self {
        Self {
            subject: DELIVERY_SUBJECT.to_owned(),
            durable_name: DELIVERY_CONSUMER.to_owned(),
            ack_wait: Duration::from_secs(30),
            max_deliver: 4,
            backoff: BackoffSchedule::default(),
        }
    }
}

/// A message handed to a consumer by [`DurableQueue::claim`].
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    /// Queue-assigned identifier, used to ack or reject.
    pub id: MessageId,

    /// Serialized envelope payload.
    pub payload: Bytes,

    /// How many times this message has been handed out, counting this claim.
    pub deliveries: u32,
}

/// Persistent, at-least-once message log with durable consumer bindings.
///
/// Contract:
/// - `publish` appends a message under a subject; it becomes immediately
///   claimable.
/// - `claim` hands the oldest eligible message of the binding's subject to
///   at most one consumer at a time and advances its delivery counter. The
///   message becomes eligible again after the binding's backoff delay for
///   that attempt (or `ack_wait` when the schedule is empty) unless it is
///   acknowledged first. Once the counter reaches `max_deliver` the message
///   is never handed out again and is eventually dropped.
/// - `ack` permanently removes a message after successful processing.
/// - `reject` permanently removes a message without further redelivery, for
///   payloads that can never succeed.
pub trait DurableQueue: Send + Sync + 'static {
    /// Appends a message under a subject.
    fn publish(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Claims the next eligible message for a consumer binding, if any.
    fn claim<'a>(
        &'a self,
        binding: &'a ConsumerBinding,
    ) -> Pin<Box<dyn Future<Output = Result<Option<QueuedMessage>>> + Send + 'a>>;

    /// Acknowledges a claimed message, permanently removing it.
    fn ack(&self, id: MessageId) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Terminally removes a claimed message without redelivery.
    fn reject(&self, id: MessageId) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

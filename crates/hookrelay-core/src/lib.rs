//! Core domain types for the hookrelay webhook relay.
//!
//! Provides the destination declaration codec, the envelope that crosses the
//! ingestion/delivery boundary, and the durable queue abstraction the relay
//! is built around. All other crates depend on these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod destination;
pub mod envelope;
pub mod queue;
pub mod time;

pub use destination::{AuthScheme, DecodeError, Destination};
pub use envelope::Envelope;
pub use queue::{
    BackoffSchedule, ConsumerBinding, DurableQueue, InMemoryQueue, MessageId, PostgresQueue,
    QueueError, QueuedMessage,
};
pub use time::{Clock, SystemClock, TestClock};

//! Webhook delivery engine for hookrelay.
//!
//! This crate implements the consuming side of the relay: durable workers
//! that claim envelopes from the queue and drive the outbound HTTP call.
//!
//! # Architecture
//!
//! Workers bind to the delivery subject as a durable consumer group and pull
//! one envelope at a time. Each worker handles the complete attempt:
//!
//! 1. **Claim** - pull the next eligible envelope from the queue
//! 2. **Decode** - deserialize it, rejecting corrupt payloads terminally
//! 3. **Deliver** - POST the body to the destination with its auth headers
//! 4. **Settle** - acknowledge success, or leave failures for the queue's
//!    own redelivery/backoff machinery
//!
//! The worker never schedules retries itself. Redelivery timing, attempt
//! counting, and exhaustion all belong to the durable queue; omitting the
//! acknowledgement is the whole failure protocol. Delivery is therefore
//! at-least-once and destinations must tolerate duplicates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod engine;
pub mod error;
mod worker;
pub mod worker_pool;

pub use client::{ClientConfig, DeliveryClient, DeliveryOutcome};
pub use engine::DeliveryEngine;
pub use error::{DeliveryError, Result};
pub use worker::{DeliveryConfig, DeliveryWorker, EngineStats};

/// Default number of concurrent delivery workers.
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Default outbound HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

//! In-memory durable queue.
//!
//! Deterministic implementation of the queue contract for tests and
//! single-process deployments. Redelivery visibility is driven by an
//! injected [`Clock`], so tests advance time explicitly instead of sleeping
//! through backoff intervals. Durability across restarts is explicitly not
//! provided; use [`super::PostgresQueue`] for that.

use std::{future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use super::{ConsumerBinding, DurableQueue, MessageId, QueueError, QueuedMessage, Result};
use crate::time::{Clock, SystemClock};

struct StoredMessage {
    id: MessageId,
    subject: String,
    payload: Bytes,
    deliveries: u32,
    visible_at: DateTime<Utc>,
    sequence: u64,
}

struct QueueState {
    messages: Vec<StoredMessage>,
    next_sequence: u64,
}

/// In-memory queue satisfying the [`DurableQueue`] contract.
pub struct InMemoryQueue {
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    /// Creates a queue driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Creates a queue driven by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock, state: Mutex::new(QueueState { messages: Vec::new(), next_sequence: 0 }) }
    }

    /// Number of messages currently held under a subject, visible or not.
    pub async fn depth(&self, subject: &str) -> usize {
        self.state.lock().await.messages.iter().filter(|m| m.subject == subject).count()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableQueue for InMemoryQueue {
    fn publish(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let subject = subject.to_owned();
        Box::pin(async move {
            let now = self.clock.now();
            let mut state = self.state.lock().await;
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.messages.push(StoredMessage {
                id: MessageId::new(),
                subject,
                payload,
                deliveries: 0,
                visible_at: now,
                sequence,
            });
            Ok(())
        })
    }

    fn claim<'a>(
        &'a self,
        binding: &'a ConsumerBinding,
    ) -> Pin<Box<dyn Future<Output = Result<Option<QueuedMessage>>> + Send + 'a>> {
        Box::pin(async move {
            let now = self.clock.now();
            let mut state = self.state.lock().await;

            // A message whose final ack window lapsed without an ack has
            // exhausted its redelivery budget and is dropped.
            state.messages.retain(|message| {
                let exhausted = message.subject == binding.subject
                    && message.deliveries >= binding.max_deliver
                    && message.visible_at <= now;
                if exhausted {
                    debug!(
                        message_id = %message.id,
                        deliveries = message.deliveries,
                        "dropping message after exhausting delivery attempts"
                    );
                }
                !exhausted
            });

            let Some(message) = state
                .messages
                .iter_mut()
                .filter(|message| {
                    message.subject == binding.subject
                        && message.deliveries < binding.max_deliver
                        && message.visible_at <= now
                })
                .min_by_key(|message| message.sequence)
            else {
                return Ok(None);
            };

            message.deliveries += 1;
            let delay =
                binding.backoff.delay_after(message.deliveries).unwrap_or(binding.ack_wait);
            let delta = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
            message.visible_at = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);

            Ok(Some(QueuedMessage {
                id: message.id,
                payload: message.payload.clone(),
                deliveries: message.deliveries,
            }))
        })
    }

    fn ack(&self, id: MessageId) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let before = state.messages.len();
            state.messages.retain(|message| message.id != id);
            if state.messages.len() == before {
                return Err(QueueError::UnknownMessage { id });
            }
            Ok(())
        })
    }

    fn reject(&self, id: MessageId) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Removal is removal either way; the distinction is the caller's
        // intent, which the in-memory store does not track.
        self.ack(id)
    }
}

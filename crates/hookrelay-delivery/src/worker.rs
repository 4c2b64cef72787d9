//! Delivery worker: claims envelopes and drives the outbound call.

use std::{sync::Arc, time::Duration};

use hookrelay_core::{Clock, ConsumerBinding, DurableQueue, Envelope, QueuedMessage};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    client::{ClientConfig, DeliveryClient},
    error::Result,
};

/// Configuration for the delivery engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Number of concurrent delivery workers.
    pub worker_count: usize,

    /// How long an idle worker waits before polling the queue again.
    pub poll_interval: Duration,

    /// Outbound HTTP client configuration.
    pub client_config: ClientConfig,

    /// Durable consumer binding the workers claim from.
    pub consumer: ConsumerBinding,

    /// Maximum time to wait for workers to finish during shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::DEFAULT_WORKER_COUNT,
            poll_interval: Duration::from_secs(1),
            client_config: ClientConfig::default(),
            consumer: ConsumerBinding::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Statistics for delivery engine monitoring.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Number of active delivery workers.
    pub active_workers: usize,
    /// Messages claimed since startup.
    pub messages_processed: u64,
    /// Deliveries acknowledged after a success response.
    pub delivered: u64,
    /// Attempts left on the queue for redelivery.
    pub retryable_failures: u64,
    /// Corrupt envelopes terminally rejected.
    pub rejected: u64,
}

/// Individual worker processing webhook deliveries.
pub struct DeliveryWorker {
    id: usize,
    queue: Arc<dyn DurableQueue>,
    config: DeliveryConfig,
    client: Arc<DeliveryClient>,
    stats: Arc<RwLock<EngineStats>>,
    cancellation_token: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl DeliveryWorker {
    /// Creates a new delivery worker.
    pub fn new(
        id: usize,
        queue: Arc<dyn DurableQueue>,
        config: DeliveryConfig,
        client: Arc<DeliveryClient>,
        stats: Arc<RwLock<EngineStats>>,
        cancellation_token: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { id, queue, config, client, stats, cancellation_token, clock }
    }

    /// Main worker loop: claims and processes envelopes until cancelled.
    ///
    /// # Errors
    ///
    /// Never returns an error today; processing failures are logged and the
    /// loop continues after a pause.
    pub async fn run(&self) -> Result<()> {
        info!(worker_id = self.id, "delivery worker starting");

        loop {
            if self.cancellation_token.is_cancelled() {
                info!(worker_id = self.id, "delivery worker received shutdown signal");
                break;
            }

            match self.process_next().await {
                Ok(true) => {
                    // More work may be waiting; claim again immediately.
                },
                Ok(false) => {
                    tokio::select! {
                        () = self.clock.sleep(self.config.poll_interval) => {},
                        () = self.cancellation_token.cancelled() => break,
                    }
                },
                Err(error) => {
                    error!(worker_id = self.id, error = %error, "worker processing failed");
                    tokio::select! {
                        // Pause before retrying to avoid a tight error loop.
                        () = self.clock.sleep(Duration::from_secs(5)) => {},
                        () = self.cancellation_token.cancelled() => break,
                    }
                },
            }
        }

        info!(worker_id = self.id, "delivery worker stopped");
        Ok(())
    }

    /// Claims and processes at most one envelope.
    ///
    /// Returns whether a message was available. Used directly by tests to
    /// step the state machine without background tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue itself fails; outbound delivery
    /// failures are settled via the queue and are not errors here.
    pub async fn process_next(&self) -> Result<bool> {
        let Some(message) = self.queue.claim(&self.config.consumer).await? else {
            return Ok(false);
        };

        {
            let mut stats = self.stats.write().await;
            stats.messages_processed += 1;
        }

        self.process_message(message).await?;
        Ok(true)
    }

    async fn process_message(&self, message: QueuedMessage) -> Result<()> {
        // A payload that does not deserialize can never become well-formed
        // on retry; remove it instead of burning redelivery attempts.
        let envelope = match Envelope::from_bytes(&message.payload) {
            Ok(envelope) => envelope,
            Err(error) => {
                warn!(
                    worker_id = self.id,
                    message_id = %message.id,
                    error = %error,
                    "rejecting corrupt envelope"
                );
                self.queue.reject(message.id).await?;
                let mut stats = self.stats.write().await;
                stats.rejected += 1;
                return Ok(());
            },
        };

        debug!(
            worker_id = self.id,
            message_id = %message.id,
            url = %envelope.destination.url,
            origin_header = %envelope.origin_header,
            attempt = message.deliveries,
            "attempting webhook delivery"
        );

        match self.client.deliver(&envelope.destination, envelope.body.clone()).await {
            Ok(outcome) if outcome.is_success() => {
                self.queue.ack(message.id).await?;
                let mut stats = self.stats.write().await;
                stats.delivered += 1;
                drop(stats);

                info!(
                    worker_id = self.id,
                    url = %envelope.destination.url,
                    status = outcome.status,
                    attempt = message.deliveries,
                    duration_ms = outcome.duration.as_millis(),
                    "webhook delivered"
                );
            },
            Ok(outcome) => {
                // No ack: the queue re-offers the message after its backoff.
                let mut stats = self.stats.write().await;
                stats.retryable_failures += 1;
                drop(stats);

                warn!(
                    worker_id = self.id,
                    url = %envelope.destination.url,
                    status = outcome.status,
                    attempt = message.deliveries,
                    "delivery failed, leaving message for redelivery"
                );
            },
            Err(error) => {
                let mut stats = self.stats.write().await;
                stats.retryable_failures += 1;
                drop(stats);

                warn!(
                    worker_id = self.id,
                    url = %envelope.destination.url,
                    error = %error,
                    attempt = message.deliveries,
                    "delivery failed, leaving message for redelivery"
                );
            },
        }

        Ok(())
    }
}

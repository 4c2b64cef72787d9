//! Delivery engine facade.
//!
//! Owns the HTTP client, statistics, cancellation token, and worker pool,
//! and exposes the start/shutdown lifecycle the binary drives.

use std::sync::Arc;

use hookrelay_core::{Clock, DurableQueue, SystemClock};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    client::DeliveryClient,
    error::Result,
    worker::{DeliveryConfig, DeliveryWorker, EngineStats},
    worker_pool::WorkerPool,
};

/// Coordinates the webhook delivery workers.
pub struct DeliveryEngine {
    queue: Arc<dyn DurableQueue>,
    config: DeliveryConfig,
    client: Arc<DeliveryClient>,
    stats: Arc<RwLock<EngineStats>>,
    cancellation_token: CancellationToken,
    worker_pool: Option<WorkerPool>,
    clock: Arc<dyn Clock>,
}

impl DeliveryEngine {
    /// Creates an engine on the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery client cannot be initialized.
    pub fn new(queue: Arc<dyn DurableQueue>, config: DeliveryConfig) -> Result<Self> {
        Self::with_clock(queue, config, Arc::new(SystemClock::new()))
    }

    /// Creates an engine with an injected clock, for deterministic tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery client cannot be initialized.
    pub fn with_clock(
        queue: Arc<dyn DurableQueue>,
        config: DeliveryConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = Arc::new(DeliveryClient::new(config.client_config.clone())?);

        Ok(Self {
            queue,
            config,
            client,
            stats: Arc::new(RwLock::new(EngineStats::default())),
            cancellation_token: CancellationToken::new(),
            worker_pool: None,
            clock,
        })
    }

    /// Spawns the configured worker pool and returns immediately.
    pub async fn start(&mut self) {
        info!(
            worker_count = self.config.worker_count,
            subject = %self.config.consumer.subject,
            durable_name = %self.config.consumer.durable_name,
            "starting webhook delivery engine"
        );

        let mut worker_pool = WorkerPool::new(
            self.queue.clone(),
            self.config.clone(),
            self.client.clone(),
            self.stats.clone(),
            self.cancellation_token.clone(),
            self.clock.clone(),
        );
        worker_pool.spawn_workers().await;
        self.worker_pool = Some(worker_pool);
    }

    /// Gracefully drains and stops all workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown timeout is exceeded.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("shutting down delivery engine");

        if let Some(worker_pool) = self.worker_pool.take() {
            worker_pool.shutdown_graceful(self.config.shutdown_timeout).await?;
        } else {
            info!("delivery engine was not started, nothing to drain");
        }
        Ok(())
    }

    /// Returns current engine statistics.
    pub async fn stats(&self) -> EngineStats {
        self.stats.read().await.clone()
    }

    /// Claims and processes at most one envelope synchronously.
    ///
    /// Designed for tests and controlled draining: no background workers are
    /// involved, and the call returns once the attempt is settled. Returns
    /// whether a message was available.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue fails.
    pub async fn process_next(&self) -> Result<bool> {
        let worker = DeliveryWorker::new(
            0,
            self.queue.clone(),
            self.config.clone(),
            self.client.clone(),
            self.stats.clone(),
            self.cancellation_token.clone(),
            self.clock.clone(),
        );

        worker.process_next().await
    }
}

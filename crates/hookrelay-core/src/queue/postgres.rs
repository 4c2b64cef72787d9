//! PostgreSQL-backed durable queue.
//!
//! Messages live in a single `queue_messages` table. Claims run inside a
//! transaction using `FOR UPDATE SKIP LOCKED`, so concurrent workers never
//! receive the same delivery attempt and never block each other. Redelivery
//! visibility is a timestamp column advanced on every claim from the
//! binding's backoff schedule.

use std::{future::Future, pin::Pin};

use bytes::Bytes;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::{ConsumerBinding, DurableQueue, MessageId, QueueError, QueuedMessage, Result};

/// Durable queue persisted in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresQueue {
    pool: PgPool,
}

impl PostgresQueue {
    /// Creates a queue on an existing connection pool.
    ///
    /// Call [`PostgresQueue::ensure_schema`] once at startup before
    /// publishing or claiming.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the queue table and its claim index if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the DDL statements fail.
    pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS queue_messages (
                id UUID PRIMARY KEY,
                subject TEXT NOT NULL,
                payload BYTEA NOT NULL,
                deliveries INTEGER NOT NULL DEFAULT 0,
                visible_at TIMESTAMPTZ NOT NULL,
                published_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_queue_messages_claim
            ON queue_messages (subject, visible_at, published_at)
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

impl DurableQueue for PostgresQueue {
    fn publish(
        &self,
        subject: &str,
        payload: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let subject = subject.to_owned();
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO queue_messages (id, subject, payload, deliveries, visible_at)
                VALUES ($1, $2, $3, 0, $4)
                ",
            )
            .bind(Uuid::new_v4())
            .bind(&subject)
            .bind(payload.as_ref())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    fn claim<'a>(
        &'a self,
        binding: &'a ConsumerBinding,
    ) -> Pin<Box<dyn Future<Output = Result<Option<QueuedMessage>>> + Send + 'a>> {
        Box::pin(async move {
            let now = Utc::now();
            let max_deliver = i32::try_from(binding.max_deliver).unwrap_or(i32::MAX);

            let mut tx = self.pool.begin().await?;

            // Messages whose final ack window lapsed without an ack have
            // exhausted their delivery budget.
            sqlx::query(
                r"
                DELETE FROM queue_messages
                WHERE subject = $1 AND deliveries >= $2 AND visible_at <= $3
                ",
            )
            .bind(&binding.subject)
            .bind(max_deliver)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let row: Option<(Uuid, Vec<u8>, i32)> = sqlx::query_as(
                r"
                SELECT id, payload, deliveries FROM queue_messages
                WHERE subject = $1 AND deliveries < $2 AND visible_at <= $3
                ORDER BY published_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
                ",
            )
            .bind(&binding.subject)
            .bind(max_deliver)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((id, payload, deliveries)) = row else {
                tx.rollback().await?;
                return Ok(None);
            };

            let deliveries = u32::try_from(deliveries).unwrap_or(0) + 1;
            let delay = binding.backoff.delay_after(deliveries).unwrap_or(binding.ack_wait);
            let delta = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::MAX);
            let visible_at = now.checked_add_signed(delta).unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);

            sqlx::query("UPDATE queue_messages SET deliveries = $2, visible_at = $3 WHERE id = $1")
                .bind(id)
                .bind(i32::try_from(deliveries).unwrap_or(i32::MAX))
                .bind(visible_at)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            Ok(Some(QueuedMessage {
                id: MessageId(id),
                payload: Bytes::from(payload),
                deliveries,
            }))
        })
    }

    fn ack(&self, id: MessageId) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM queue_messages WHERE id = $1")
                .bind(id.0)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(QueueError::UnknownMessage { id });
            }
            Ok(())
        })
    }

    fn reject(&self, id: MessageId) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.ack(id)
    }
}

//! PostgreSQL-backed queue implementation.
//!
//! Stores all queues in a single `queue_messages` table keyed by queue
//! name. Fetching claims messages with `FOR UPDATE SKIP LOCKED` so
//! concurrent consumers never block each other; the visibility timeout
//! is a `visible_at` column stamped on each claim.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::debug;

use super::JobQueue;
use crate::{
    error::{QueueError, Result},
    models::{MessageId, QueueMessage},
    time::Clock,
};

impl sqlx::FromRow<'_, PgRow> for QueueMessage {
    fn from_row(row: &PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            payload: row.try_get("payload")?,
            dequeue_count: row.try_get("dequeue_count")?,
            visible_at: row.try_get("visible_at")?,
            enqueued_at: row.try_get("enqueued_at")?,
        })
    }
}

/// PostgreSQL implementation of [`JobQueue`].
pub struct PgJobQueue {
    pool: PgPool,
    name: String,
    clock: Arc<dyn Clock>,
}

impl PgJobQueue {
    /// Creates a queue client for the named queue.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::InvalidQueueName` if the name is empty or
    /// contains characters outside `[a-z0-9-]`.
    pub fn new(pool: PgPool, name: impl Into<String>, clock: Arc<dyn Clock>) -> Result<Self> {
        let name = name.into();
        validate_queue_name(&name)?;
        Ok(Self { pool, name, clock })
    }

    /// Name of the queue this client operates on.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn visibility_deadline(&self, timeout: Duration) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        self.clock.now_utc() + offset
    }
}

/// Queue names follow the storage-queue convention: lowercase
/// alphanumerics and dashes only.
fn validate_queue_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(QueueError::InvalidQueueName("name is empty".to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err(QueueError::InvalidQueueName(name.to_string()));
    }
    Ok(())
}

impl JobQueue for PgJobQueue {
    fn ensure_exists(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS queue_messages (
                    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                    queue TEXT NOT NULL,
                    payload TEXT NOT NULL,
                    dequeue_count INTEGER NOT NULL DEFAULT 0,
                    visible_at TIMESTAMPTZ NOT NULL,
                    enqueued_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )
                "#,
            )
            .execute(&self.pool)
            .await?;

            sqlx::query(
                r#"
                CREATE INDEX IF NOT EXISTS idx_queue_messages_visible
                ON queue_messages(queue, visible_at, enqueued_at)
                "#,
            )
            .execute(&self.pool)
            .await?;

            debug!(queue = %self.name, "queue storage ensured");
            Ok(())
        })
    }

    fn enqueue(
        &self,
        payload: &str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageId>> + Send + '_>> {
        let payload = payload.to_string();
        Box::pin(async move {
            let id = MessageId::new();
            sqlx::query(
                r#"
                INSERT INTO queue_messages (id, queue, payload, visible_at, enqueued_at)
                VALUES ($1, $2, $3, $4, $4)
                "#,
            )
            .bind(id)
            .bind(&self.name)
            .bind(&payload)
            .bind(self.clock.now_utc())
            .execute(&self.pool)
            .await?;

            Ok(id)
        })
    }

    fn fetch_batch(
        &self,
        max_count: usize,
        visibility_timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<QueueMessage>>> + Send + '_>> {
        Box::pin(async move {
            let now = self.clock.now_utc();
            let deadline = self.visibility_deadline(visibility_timeout);

            let mut tx = self.pool.begin().await?;

            // SKIP LOCKED keeps concurrent fetchers from blocking on
            // each other's claims within a single visibility window.
            let ids: Vec<MessageId> = sqlx::query_scalar(
                r#"
                SELECT id FROM queue_messages
                WHERE queue = $1 AND visible_at <= $2
                ORDER BY enqueued_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
                "#,
            )
            .bind(&self.name)
            .bind(now)
            .bind(i64::try_from(max_count).unwrap_or(i64::MAX))
            .fetch_all(&mut *tx)
            .await?;

            if ids.is_empty() {
                tx.rollback().await?;
                return Ok(Vec::new());
            }

            let uuids: Vec<uuid::Uuid> = ids.iter().map(|id| id.0).collect();
            let messages = sqlx::query_as::<_, QueueMessage>(
                r#"
                UPDATE queue_messages
                SET visible_at = $2, dequeue_count = dequeue_count + 1
                WHERE id = ANY($1)
                RETURNING id, payload, dequeue_count, visible_at, enqueued_at
                "#,
            )
            .bind(&uuids)
            .bind(deadline)
            .fetch_all(&mut *tx)
            .await?;

            tx.commit().await?;

            debug!(queue = %self.name, fetched = messages.len(), "fetched message batch");
            Ok(messages)
        })
    }

    fn delete(&self, id: MessageId) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM queue_messages WHERE id = $1 AND queue = $2")
                .bind(id)
                .bind(&self.name)
                .execute(&self.pool)
                .await?;

            if result.rows_affected() == 0 {
                return Err(QueueError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::time::TestClock;

    #[tokio::test]
    async fn queue_client_reports_its_name() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/postbox_test")
            .expect("lazy pool");
        let queue =
            PgJobQueue::new(pool, "email", Arc::new(TestClock::new())).expect("valid queue name");

        assert_eq!(queue.name(), "email");
    }

    #[test]
    fn queue_names_validated() {
        assert!(validate_queue_name("email").is_ok());
        assert!(validate_queue_name("email-jobs-2").is_ok());

        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name("Email").is_err());
        assert!(validate_queue_name("email_jobs").is_err());
        assert!(validate_queue_name("email jobs").is_err());
    }
}

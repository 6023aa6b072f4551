//! In-memory queue implementation for testing.
//!
//! Honors the same visibility-timeout semantics as the Postgres backend
//! but keeps messages in memory and reads time from the injected clock,
//! so tests can expire visibility windows deterministically. Supports
//! injecting fetch failures to exercise the consumer's error handling.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tokio::sync::RwLock;

use super::JobQueue;
use crate::{
    error::{QueueError, Result},
    models::{MessageId, QueueMessage},
    time::Clock,
};

/// Deterministic in-memory [`JobQueue`] for tests.
pub struct InMemoryQueue {
    clock: Arc<dyn Clock>,
    messages: Arc<RwLock<Vec<QueueMessage>>>,
    fetch_error: Arc<RwLock<Option<String>>>,
    delete_error: Arc<RwLock<Option<String>>>,
}

impl InMemoryQueue {
    /// Creates an empty queue reading time from the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            messages: Arc::new(RwLock::new(Vec::new())),
            fetch_error: Arc::new(RwLock::new(None)),
            delete_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Injects an error returned by the next `fetch_batch` call.
    pub async fn inject_fetch_error(&self, error: impl Into<String>) {
        *self.fetch_error.write().await = Some(error.into());
    }

    /// Injects an error returned by the next `delete` call.
    ///
    /// The message is left in place, as a failed backend delete would.
    pub async fn inject_delete_error(&self, error: impl Into<String>) {
        *self.delete_error.write().await = Some(error.into());
    }

    /// Total number of messages still in the queue, visible or not.
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Returns true when no messages remain.
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    /// Number of messages currently visible to fetchers.
    pub async fn visible_len(&self) -> usize {
        let now = self.clock.now_utc();
        self.messages.read().await.iter().filter(|m| m.visible_at <= now).count()
    }

    /// Returns true if the message is still present in the queue.
    pub async fn contains(&self, id: MessageId) -> bool {
        self.messages.read().await.iter().any(|m| m.id == id)
    }

    /// Current dequeue count of a message, if it is still queued.
    pub async fn dequeue_count(&self, id: MessageId) -> Option<i32> {
        self.messages.read().await.iter().find(|m| m.id == id).map(|m| m.dequeue_count)
    }
}

impl JobQueue for InMemoryQueue {
    fn ensure_exists(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn enqueue(
        &self,
        payload: &str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageId>> + Send + '_>> {
        let payload = payload.to_string();
        Box::pin(async move {
            let now = self.clock.now_utc();
            let id = MessageId::new();
            self.messages.write().await.push(QueueMessage {
                id,
                payload,
                dequeue_count: 0,
                visible_at: now,
                enqueued_at: now,
            });
            Ok(id)
        })
    }

    fn fetch_batch(
        &self,
        max_count: usize,
        visibility_timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<QueueMessage>>> + Send + '_>> {
        Box::pin(async move {
            if let Some(error) = self.fetch_error.write().await.take() {
                return Err(QueueError::Database(error));
            }

            let now = self.clock.now_utc();
            let deadline =
                now + chrono::Duration::from_std(visibility_timeout).unwrap_or(chrono::Duration::MAX);

            let mut messages = self.messages.write().await;
            let mut fetched = Vec::new();

            for message in messages.iter_mut() {
                if fetched.len() >= max_count {
                    break;
                }
                if message.visible_at <= now {
                    message.visible_at = deadline;
                    message.dequeue_count += 1;
                    fetched.push(message.clone());
                }
            }

            Ok(fetched)
        })
    }

    fn delete(&self, id: MessageId) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if let Some(error) = self.delete_error.write().await.take() {
                return Err(QueueError::Database(error));
            }

            let mut messages = self.messages.write().await;
            let before = messages.len();
            messages.retain(|m| m.id != id);

            if messages.len() == before {
                return Err(QueueError::NotFound(id.to_string()));
            }
            Ok(())
        })
    }
}

//! The polling consumer loop.
//!
//! A single logical thread of control: sleep, fetch a batch, handle
//! each message in order, delete the handled ones, repeat. Per-message
//! failures are isolated; fetch failures are logged and retried on the
//! next cycle after a short backoff. The loop exits only through its
//! cancellation token.

use std::{sync::Arc, time::Duration};

use postbox_core::{Clock, JobQueue, QueueError, QueueMessage, Result};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::handler::MessageHandler;

/// Backoff applied after a failed fetch to avoid tight error loops.
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Configuration for the consumer loop.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Time to sleep between polling cycles.
    pub poll_interval: Duration,

    /// Maximum messages to fetch per cycle.
    pub batch_size: usize,

    /// How long a fetched message stays hidden from other consumers.
    pub visibility_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(crate::DEFAULT_POLL_INTERVAL_SECONDS),
            batch_size: crate::DEFAULT_BATCH_SIZE,
            visibility_timeout: Duration::from_secs(
                crate::DEFAULT_VISIBILITY_TIMEOUT_MINUTES * 60,
            ),
        }
    }
}

/// Counters for consumer monitoring.
#[derive(Debug, Clone, Default)]
pub struct ConsumerStats {
    /// Completed polling cycles.
    pub cycles: u64,
    /// Messages handled successfully and deleted.
    pub messages_handled: u64,
    /// Handler failures; the messages were left for redelivery.
    pub handler_failures: u64,
    /// Deletes that failed after a successful handle.
    pub delete_failures: u64,
}

/// Long-running queue consumer.
///
/// Holds the queue client, the message handler, and a cancellation
/// token checked before every sleep and fetch so shutdown never waits
/// for a full polling interval's worth of work.
pub struct Consumer {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn MessageHandler>,
    config: ConsumerConfig,
    cancellation_token: CancellationToken,
    clock: Arc<dyn Clock>,
    stats: Arc<RwLock<ConsumerStats>>,
}

impl Consumer {
    /// Creates a consumer over the given queue and handler.
    pub fn new(
        queue: Arc<dyn JobQueue>,
        handler: Arc<dyn MessageHandler>,
        config: ConsumerConfig,
        cancellation_token: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            handler,
            config,
            cancellation_token,
            clock,
            stats: Arc::new(RwLock::new(ConsumerStats::default())),
        }
    }

    /// Returns a snapshot of the consumer counters.
    pub async fn stats(&self) -> ConsumerStats {
        self.stats.read().await.clone()
    }

    /// Runs the polling loop until the cancellation token fires.
    pub async fn run(&self) {
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            batch_size = self.config.batch_size,
            "consumer starting"
        );

        loop {
            if self.cancellation_token.is_cancelled() {
                break;
            }

            tokio::select! {
                () = self.clock.sleep(self.config.poll_interval) => {},
                () = self.cancellation_token.cancelled() => break,
            }

            if self.cancellation_token.is_cancelled() {
                break;
            }

            match self.poll_once().await {
                Ok(handled) => {
                    if handled > 0 {
                        debug!(handled, "polling cycle completed");
                    }
                },
                Err(error) => {
                    // Transient infrastructure failure; next cycle retries.
                    error!(error = %error, "fetching message batch failed");
                    tokio::select! {
                        () = self.clock.sleep(ERROR_BACKOFF) => {},
                        () = self.cancellation_token.cancelled() => break,
                    }
                },
            }
        }

        info!("consumer stopped");
    }

    /// Performs exactly one fetch/handle/delete cycle.
    ///
    /// Returns the number of messages handled successfully. Exposed so
    /// tests and controlled batch processing can drive the consumer
    /// without the polling loop.
    ///
    /// # Errors
    ///
    /// Returns error only if fetching the batch fails; per-message
    /// handler and delete failures are absorbed and counted.
    pub async fn poll_once(&self) -> Result<u64> {
        let messages =
            self.queue.fetch_batch(self.config.batch_size, self.config.visibility_timeout).await?;

        let mut handled = 0;
        for message in messages {
            if self.cancellation_token.is_cancelled() {
                break;
            }
            if self.process_message(&message).await {
                handled += 1;
            }
        }

        let mut stats = self.stats.write().await;
        stats.cycles += 1;
        stats.messages_handled += handled;
        drop(stats);

        Ok(handled)
    }

    /// Handles a single message and deletes it on success.
    ///
    /// Returns true when the message was handled and its delete
    /// attempted. A handler failure leaves the message queued so it
    /// reappears after the visibility timeout.
    async fn process_message(&self, message: &QueueMessage) -> bool {
        match self.handler.handle(&message.payload).await {
            Ok(()) => {
                self.delete_message(message).await;
                true
            },
            Err(error) => {
                warn!(
                    message_id = %message.id,
                    dequeue_count = message.dequeue_count,
                    error = %error,
                    "handler failed, leaving message for redelivery"
                );
                self.stats.write().await.handler_failures += 1;
                false
            },
        }
    }

    async fn delete_message(&self, message: &QueueMessage) {
        match self.queue.delete(message.id).await {
            Ok(()) => {},
            Err(QueueError::NotFound(_)) => {
                // Visibility expired mid-handle and another consumer
                // deleted the message first. At-least-once, not
                // exactly-once.
                warn!(message_id = %message.id, "delete lost race, message already removed");
                self.stats.write().await.delete_failures += 1;
            },
            Err(error) => {
                warn!(message_id = %message.id, error = %error, "deleting message failed");
                self.stats.write().await.delete_failures += 1;
            },
        }
    }
}

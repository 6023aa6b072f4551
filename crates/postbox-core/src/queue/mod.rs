//! Queue client adapter for the job consumer.
//!
//! Provides a trait-based abstraction over a named message queue with
//! visibility-timeout semantics, enabling the consumer loop to be
//! tested without a database. The production implementation is backed
//! by PostgreSQL; tests use [`mock::InMemoryQueue`].

use std::{future::Future, pin::Pin, time::Duration};

pub mod mock;
mod postgres;

pub use postgres::PgJobQueue;

use crate::{
    error::Result,
    models::{MessageId, QueueMessage},
};

/// Operations on a named message queue.
///
/// The queue provides at-least-once delivery: a fetched message is
/// hidden from other fetchers for the visibility timeout and reappears
/// unless explicitly deleted. Two consumers may race to fetch the same
/// message across visibility windows, but at most one delete succeeds.
pub trait JobQueue: Send + Sync + 'static {
    /// Provisions the queue's backing storage if missing.
    ///
    /// Idempotent; never fails because the queue already exists.
    fn ensure_exists(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Appends a message to the queue, immediately visible to fetchers.
    fn enqueue(&self, payload: &str) -> Pin<Box<dyn Future<Output = Result<MessageId>> + Send + '_>>;

    /// Fetches up to `max_count` currently-visible messages.
    ///
    /// Each returned message becomes invisible to other fetchers for
    /// `visibility_timeout` and has its dequeue count incremented.
    /// Returns immediately with an empty batch when the queue is empty.
    fn fetch_batch(
        &self,
        max_count: usize,
        visibility_timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<QueueMessage>>> + Send + '_>>;

    /// Permanently removes a message from the queue.
    ///
    /// Returns [`QueueError::NotFound`](crate::QueueError::NotFound)
    /// when the message no longer exists, which callers tolerate as a
    /// lost delete race rather than a fatal condition.
    fn delete(&self, id: MessageId) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

//! Pluggable message handling capability.
//!
//! The consumer loop is agnostic to what a message means; it hands the
//! payload to a [`MessageHandler`] and uses the result to decide
//! whether the message may be deleted.

use std::{future::Future, pin::Pin};

use thiserror::Error;
use tracing::info;

/// Failure reported by a message handler.
///
/// A handler error means the message's effect was not durably applied,
/// so the consumer leaves the message queued for redelivery.
#[derive(Debug, Clone, Error)]
#[error("message handling failed: {message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    /// Creates a handler error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Processes a single queue message payload.
///
/// Implementations must be idempotent where possible: the queue
/// guarantees at-least-once delivery, so a payload may be handled more
/// than once if a delete fails or a visibility window expires mid-run.
pub trait MessageHandler: Send + Sync + 'static {
    /// Handles one message payload.
    ///
    /// Returning `Err` leaves the message queued for redelivery after
    /// its visibility timeout.
    fn handle<'a>(
        &'a self,
        payload: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>>;
}

/// Default handler that traces the payload and succeeds.
///
/// Stands in for real job processing; replace it to do actual work.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogHandler;

impl MessageHandler for LogHandler {
    fn handle<'a>(
        &'a self,
        payload: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send + 'a>> {
        Box::pin(async move {
            info!(payload, "processing request");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_handler_accepts_any_payload() {
        let handler = LogHandler;
        assert!(handler.handle("send welcome email to a@example.com").await.is_ok());
        assert!(handler.handle("").await.is_ok());
    }

    #[test]
    fn handler_error_display() {
        let err = HandlerError::new("smtp unreachable");
        assert_eq!(err.to_string(), "message handling failed: smtp unreachable");
    }
}

//! Error types and result handling for queue operations.
//!
//! Defines a small structured taxonomy covering the queue backend.
//! Transient infrastructure failures and the delete-race-lost case are
//! distinguishable so callers can tolerate the latter without treating
//! it as fatal.

use thiserror::Error;

/// Result type alias using `QueueError`.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Error type for queue client operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Message no longer exists; its visibility window expired and
    /// another consumer deleted it. Callers must tolerate this.
    #[error("message not found: {0}")]
    NotFound(String),

    /// Queue name failed validation at construction.
    #[error("invalid queue name: {0}")]
    InvalidQueueName(String),
}

impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested message not found".to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = QueueError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, QueueError::NotFound(_)));
    }

    #[test]
    fn error_display_format() {
        let err = QueueError::Database("connection lost".to_string());
        assert_eq!(err.to_string(), "database error: connection lost");

        let err = QueueError::InvalidQueueName("bad name!".to_string());
        assert_eq!(err.to_string(), "invalid queue name: bad name!");
    }
}

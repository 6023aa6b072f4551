//! Core domain types for the Postbox job processing service.
//!
//! Provides strongly-typed domain primitives, the error taxonomy, clock
//! abstractions for deterministic testing, and the queue client adapter
//! used by the consumer loop. The other crates depend on these
//! foundational types for type safety and consistency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod queue;
pub mod time;

pub use error::{QueueError, Result};
pub use models::{MessageId, Principal, QueueMessage, Role};
pub use queue::{JobQueue, PgJobQueue};
pub use time::{Clock, RealClock, TestClock};

//! Queue consumer loop with at-least-once delivery.
//!
//! This crate implements the polling worker that drains the job queue:
//! sleep, fetch a batch, hand each message to the configured handler,
//! delete handled messages, repeat until cancelled.
//!
//! # Delivery guarantee
//!
//! A message is deleted only after its handler succeeds. Handler
//! failures leave the message in place so it reappears after its
//! visibility timeout and is retried; a failed delete (including losing
//! the race to another consumer) is logged and tolerated. The loop
//! never lets a single message's failure escape and crash the process.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use postbox_consumer::{Consumer, ConsumerConfig, LogHandler};
//! use postbox_core::{queue::mock::InMemoryQueue, RealClock};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let clock = Arc::new(RealClock::new());
//! let queue = Arc::new(InMemoryQueue::new(clock.clone()));
//! let consumer = Consumer::new(
//!     queue,
//!     Arc::new(LogHandler),
//!     ConsumerConfig::default(),
//!     CancellationToken::new(),
//!     clock,
//! );
//! consumer.run().await;
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod handler;
mod worker;

pub use handler::{HandlerError, LogHandler, MessageHandler};
pub use worker::{Consumer, ConsumerConfig, ConsumerStats};

/// Default seconds between polling cycles.
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 10;

/// Default maximum messages fetched per cycle.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default minutes a fetched message stays hidden from other consumers.
pub const DEFAULT_VISIBILITY_TIMEOUT_MINUTES: u64 = 5;

//! Postbox HTTP API.
//!
//! Serves the scheduler-invoked endpoints. Every request passes through
//! the shared-secret authenticator; privileged routes additionally
//! require the `scheduler` role via the authorization gate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod secret;
pub mod server;

pub use config::Config;
pub use secret::SharedSecret;
pub use server::{create_router, start_server, AppState};

//! HTTP request handlers for the Postbox API.
//!
//! Handlers are grouped by functionality:
//! - `schedule` — scheduler-triggered endpoints behind the role gate
//! - `health` — health and liveness probes

pub mod health;
pub mod schedule;

pub use health::{health_check, liveness_check, readiness_check};
pub use schedule::trigger_refresh;

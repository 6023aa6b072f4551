//! Scheduler-triggered endpoints.
//!
//! These routes are invoked by the external scheduler and sit behind
//! the scheduler role gate. The work itself is a stub: the endpoint
//! acknowledges the trigger with 202 and the real processing happens
//! elsewhere.

use axum::http::StatusCode;
use tracing::{info, instrument};

/// Accepts a scheduled content-refresh trigger.
///
/// Returns `202 Accepted` with no body; there is no response contract
/// beyond the status code.
#[instrument(name = "trigger_refresh")]
pub async fn trigger_refresh() -> StatusCode {
    info!("processing scheduled refresh request");
    StatusCode::ACCEPTED
}

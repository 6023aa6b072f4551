//! HTTP server configuration and request routing.
//!
//! Axum server setup with the middleware stack and graceful shutdown.
//! Requests flow through middleware in order:
//! 1. Request ID injection
//! 2. Request/response tracing
//! 3. Timeout enforcement
//! 4. Scheduler authentication (every request)
//! 5. Role gate (protected routes only)
//! 6. Handler execution

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use postbox_core::Clock;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::{
    handlers,
    middleware::auth::{require_scheduler, scheduler_auth},
    secret::SharedSecret,
};

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, used by health checks.
    pub pool: PgPool,
    /// Expected scheduler secret, loaded once at startup.
    pub secret: Arc<SharedSecret>,
    /// Clock for timestamping responses.
    pub clock: Arc<dyn Clock>,
}

/// Creates the axum router with all routes and middleware.
///
/// The scheduler authenticator wraps every route; the role gate wraps
/// only the scheduler-triggered endpoints.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check));

    let schedule_routes = Router::new()
        .route("/schedule/refresh", post(handlers::trigger_refresh))
        .route_layer(middleware::from_fn(require_scheduler));

    Router::new()
        .merge(health_routes)
        .merge(schedule_routes)
        .layer(middleware::from_fn_with_state(state.secret.clone(), scheduler_auth))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject a request ID into all responses.
///
/// Adds an X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server, serving until the shutdown token fires.
///
/// # Errors
///
/// Returns `std::io::Error` if the port is already in use or the
/// network interface is unavailable.
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
    request_timeout: Duration,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = create_router(state, request_timeout);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

//! Postbox service entry point.
//!
//! Wires the subsystems together: loads configuration, provisions the
//! job queue, spawns the consumer loop, and serves the HTTP API until
//! a shutdown signal arrives.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use postbox_api::{AppState, Config, SharedSecret};
use postbox_consumer::{Consumer, LogHandler};
use postbox_core::{Clock, JobQueue, PgJobQueue, RealClock};
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Time allowed for in-flight work to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("starting postbox service");

    let config = Config::load()?;
    info!(
        database_url = %config.database_url_masked(),
        queue = %config.queue_name,
        "configuration loaded"
    );

    let addr = config.parse_server_addr()?;
    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());

    let pool = create_database_pool(&config).await?;
    info!("database connection pool established");

    // Unrecoverable startup failures (bad queue name, unreachable
    // database) are fatal by design; everything after this point
    // degrades instead of exiting.
    let queue = Arc::new(PgJobQueue::new(pool.clone(), config.queue_name.clone(), clock.clone())?);
    queue.ensure_exists().await.context("failed to provision job queue")?;
    info!(queue = %queue.name(), "job queue provisioned");

    let shutdown = CancellationToken::new();

    let consumer = Consumer::new(
        queue,
        Arc::new(LogHandler),
        config.to_consumer_config(),
        shutdown.clone(),
        clock.clone(),
    );
    let consumer_handle = tokio::spawn(async move { consumer.run().await });

    let state = AppState {
        pool: pool.clone(),
        secret: Arc::new(SharedSecret::from_config(config.scheduler_secret.clone())),
        clock,
    };

    let server_handle = tokio::spawn({
        let shutdown = shutdown.clone();
        let request_timeout = Duration::from_secs(config.request_timeout);
        async move {
            if let Err(e) = postbox_api::start_server(state, addr, request_timeout, shutdown).await
            {
                error!(error = %e, "server failed");
            }
        }
    });

    info!(%addr, "postbox is ready");

    shutdown_signal().await;
    info!("shutdown signal received, starting graceful shutdown");
    shutdown.cancel();

    tokio::select! {
        _ = async {
            let _ = consumer_handle.await;
            let _ = server_handle.await;
        } => {
            info!("consumer and server stopped");
        },
        () = tokio::time::sleep(SHUTDOWN_GRACE) => {
            info!("shutdown grace period expired");
        },
    }

    pool.close().await;
    info!("postbox shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,postbox=debug,tower_http=debug"))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("failed to create database connection pool after retries");
            },
        }
    }
}

/// Waits for a shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received CTRL+C signal");
        },
        () = terminate => {
            info!("received SIGTERM signal");
        },
    }
}

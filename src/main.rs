//! hookrelay service entry point.
//!
//! Wires the ingestion API and the delivery engine to a PostgreSQL-backed
//! durable queue, and coordinates graceful startup and shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use hookrelay_api::{AppState, Config};
use hookrelay_core::{queue::DELIVERY_SUBJECT, DurableQueue, PostgresQueue};
use hookrelay_delivery::DeliveryEngine;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("starting hookrelay webhook relay");

    let config = Config::load()?;
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        worker_count = config.worker_count,
        "configuration loaded"
    );

    let pool = create_database_pool(&config).await?;
    PostgresQueue::ensure_schema(&pool).await.context("failed to prepare queue schema")?;
    info!("queue schema ready");

    let queue: Arc<dyn DurableQueue> = Arc::new(PostgresQueue::new(pool.clone()));

    let mut engine = DeliveryEngine::new(queue.clone(), config.to_delivery_config())
        .context("failed to build delivery engine")?;
    engine.start().await;

    let state = AppState { queue, subject: DELIVERY_SUBJECT.to_owned() };
    let addr = config.parse_server_addr()?;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = hookrelay_api::start_server(state, addr).await {
            error!(error = %e, "HTTP server failed");
        }
    });

    info!(addr = %addr, "hookrelay is ready to receive webhooks");

    shutdown_signal().await;
    info!("shutdown signal received, draining delivery workers");

    if let Err(e) = engine.shutdown().await {
        error!(error = %e, "delivery engine shutdown failed");
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(30)) => {
            info!("shutdown grace period expired");
        }
        _ = server_handle => {
            info!("HTTP server stopped");
        }
    }

    pool.close().await;
    info!("hookrelay shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,hookrelay=debug,tower_http=debug"))
        .expect("invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with retry.
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

/// Waits for CTRL+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received CTRL+C signal");
        },
        _ = terminate => {
            info!("received SIGTERM signal");
        },
    }
}

//! Server initialization and main run loop
//!
//! Contains store construction and the `run()` function that starts the
//! HTTP server.

use super::config::{AppConfig, BillingSource, StorageBackend, StorageConfig};
use super::loader::load_config;
use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use themis_billing::{PgSubscriptionStore, StaticSubscriptionStore, SubscriptionStore};
use themis_usage::{JsonlUsageStore, PgUsageStore, UsageAggregator, UsageLogger, UsageStore};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Initialized storage backends
pub struct StoreBundle {
    pub store: Arc<dyn UsageStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
}

/// Initialize the usage and subscription stores per configuration
pub async fn init_stores(config: &AppConfig) -> Result<StoreBundle> {
    let storage = &config.storage;

    let (store, pool): (Arc<dyn UsageStore>, Option<PgPool>) = match storage.backend {
        StorageBackend::Postgres => {
            let url = StorageConfig::database_url().context(
                "storage backend is `postgres` but neither POSTGRES_URL nor DATABASE_URL is set",
            )?;
            let store =
                PgUsageStore::connect(&url, storage.max_connections, storage.acquire_timeout())
                    .await
                    .context("Failed to initialize PostgreSQL usage store")?;
            let pool = store.pool().clone();
            (Arc::new(store), Some(pool))
        }
        StorageBackend::Jsonl => {
            let dir = storage.effective_logs_dir();
            let store = JsonlUsageStore::open(&dir)
                .await
                .context("Failed to initialize JSONL usage store")?;
            info!("JSONL usage store initialized at {}", dir.display());
            (Arc::new(store), None)
        }
    };

    let subscriptions: Arc<dyn SubscriptionStore> = match config.billing.source {
        BillingSource::Postgres => {
            let pool = match pool {
                Some(pool) => pool,
                None => {
                    let url = StorageConfig::database_url().context(
                        "billing source is `postgres` but neither POSTGRES_URL nor DATABASE_URL is set",
                    )?;
                    PgPoolOptions::new()
                        .max_connections(storage.max_connections)
                        .acquire_timeout(storage.acquire_timeout())
                        .connect(&url)
                        .await
                        .context("Failed to connect billing pool")?
                }
            };
            Arc::new(PgSubscriptionStore::new(pool))
        }
        BillingSource::Static => Arc::new(StaticSubscriptionStore::new()),
    };

    info!(
        "Stores initialized (usage: {}, billing: {})",
        store.name(),
        subscriptions.name()
    );

    Ok(StoreBundle {
        store,
        subscriptions,
    })
}

/// Build the ingestion logger from configuration
pub fn init_logger(config: &AppConfig, store: Arc<dyn UsageStore>) -> UsageLogger {
    UsageLogger::new(store)
        .with_retry(
            config.storage.retry_max_attempts,
            config.storage.retry_base_delay(),
        )
        .with_timeout(config.storage.op_timeout())
}

/// Run the server
pub async fn run() -> Result<()> {
    info!(
        "Starting Themis usage accounting service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = load_config().context("Failed to load configuration")?;
    info!("Configuration loaded");

    let stores = init_stores(&config).await?;
    let store = stores.store;
    let subscriptions = stores.subscriptions;

    let logger = Arc::new(init_logger(&config, store.clone()));
    let aggregator = UsageAggregator::new(store.clone());

    // Build the main router with all endpoints
    let app = Router::new()
        .merge(crate::api::health_routes())
        .merge(crate::api::docs_routes())
        .merge(crate::api::api_router())
        .route("/", get(|| async { "Themis usage accounting service" }))
        // Layers (applied to all routes)
        .layer(Extension(store))
        .layer(Extension(logger.clone()))
        .layer(Extension(aggregator))
        .layer(Extension(subscriptions))
        .layer(Extension(config.billing.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    info!("HTTP server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // Drain detached completion/tool writes before exiting
    info!("Draining in-flight usage writes...");
    let drain_timeout = tokio::time::Duration::from_secs(5);
    if tokio::time::timeout(drain_timeout, logger.shutdown())
        .await
        .is_err()
    {
        warn!(
            in_flight = logger.in_flight(),
            "usage write drain timed out, dropping remaining events"
        );
    }

    info!("Themis shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

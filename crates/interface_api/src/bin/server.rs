//! Settlement Engine - API Server Binary
//!
//! Starts the HTTP API for collections, commissions, settlements and
//! payment submissions on top of PostgreSQL.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin settlement-api
//!
//! # Run with environment variables
//! API_PORT=8080 API_DATABASE_URL=postgres://... cargo run --bin settlement-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE_URL` - PostgreSQL connection string (`DATABASE_URL` also accepted)
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_CURRENCY` - Operating currency (default: IQD)
//! * `API_AUTO_APPROVE_COMMISSIONS` - Create commissions already approved (default: false)
//! * `API_BALANCE_CACHE_TTL_SECS` - Balance cache lifetime in seconds (default: 30)

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_settlement::SettlementEngine;
use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresDirectory, PostgresSettlementStore};
use interface_api::{config::ApiConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        currency = %config.currency,
        "Starting settlement API server"
    );

    tracing::info!("Connecting to database...");
    let pool = create_pool(
        DatabaseConfig::new(config.database_url.clone())
            .max_connections(10)
            .min_connections(2)
            .connect_timeout(Duration::from_secs(30)),
    )
    .await
    .context("connecting to the database")?;

    tracing::info!("Running database migrations...");
    run_migrations(&pool).await.context("applying migrations")?;

    let store = Arc::new(PostgresSettlementStore::new(pool.clone()));
    let directory = Arc::new(PostgresDirectory::new(pool));
    let engine = Arc::new(SettlementEngine::new(store, directory, config.engine_config()));

    let app = create_router(engine, config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads API configuration from `API_`-prefixed environment variables
///
/// `DATABASE_URL` is honoured when `API_DATABASE_URL` is not set.
fn load_config() -> anyhow::Result<ApiConfig> {
    let mut config = ApiConfig::from_env().context("reading API_ configuration")?;

    if std::env::var("API_DATABASE_URL").is_err() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
    }

    Ok(config)
}

/// Initializes the tracing subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

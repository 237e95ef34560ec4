//! Academy Fee Ledger - API Server Binary
//!
//! This binary starts the HTTP API server for the academy fee ledger.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin academy-fees-api
//!
//! # Run with environment variables
//! APP_PORT=8080 APP_DATABASE_URL=postgres://... cargo run --bin academy-fees-api
//! ```
//!
//! # Environment Variables
//!
//! * `APP_HOST` - Server host (default: 0.0.0.0)
//! * `APP_PORT` - Server port (default: 8080)
//! * `APP_JWT_SECRET` - JWT signing secret (required in production)
//! * `APP_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `APP_DATABASE_URL` - PostgreSQL connection string
//! * `APP_DB_MAX_CONNECTIONS` / `APP_DB_MIN_CONNECTIONS` - Pool sizes (default: 10 / 2)
//! * `APP_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `APP_DUE_DAY` - Day of month invoices fall due (default: 5)
//! * `APP_TIMEZONE` - Academy timezone, IANA name (default: UTC)
//! * `APP_OVERPAYMENT_POLICY` - `accept` or `reject` (default: accept)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_fees::FeeLedgerService;
use infra_db::{create_pool, run_migrations, PostgresFeeLedgerAdapter, PostgresStudentDirectory};
use interface_api::{config::ApiConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("Invalid APP_* configuration")?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        "Starting Academy Fee Ledger API Server"
    );

    let billing = config.billing_config()?;
    tracing::info!(
        due_day = billing.due_day,
        timezone = billing.timezone.name(),
        overpayment_policy = %billing.overpayment_policy,
        "Billing configuration loaded"
    );

    let pool = create_pool(config.database_config())
        .await
        .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to apply database migrations")?;

    let service = FeeLedgerService::new(
        Arc::new(PostgresFeeLedgerAdapter::new(pool.clone())),
        Arc::new(PostgresStudentDirectory::new(pool)),
        billing,
    );

    let app = create_router(service, config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("Invalid server address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// In-flight requests complete before the process exits.
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

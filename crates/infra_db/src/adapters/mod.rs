//! Domain Adapters
//!
//! This module provides adapter implementations for the fee ledger ports,
//! connecting domain interfaces to the PostgreSQL database layer.
//!
//! # Architecture
//!
//! Each adapter:
//! - Implements a port trait from `domain_fees`
//! - Translates between domain models and database row types
//! - Uses the repository layer for database operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresFeeLedgerAdapter, PostgresStudentDirectory};
//! use domain_fees::FeeLedgerService;
//!
//! let service = FeeLedgerService::new(
//!     Arc::new(PostgresFeeLedgerAdapter::new(pool.clone())),
//!     Arc::new(PostgresStudentDirectory::new(pool)),
//!     BillingConfig::default(),
//! );
//! ```

pub mod fees;
pub mod students;

pub use fees::PostgresFeeLedgerAdapter;
pub use students::PostgresStudentDirectory;

use chrono::Utc;
use sqlx::PgPool;

use core_kernel::{AdapterHealth, HealthCheckResult};

/// Runs `SELECT 1` against the pool and reports the outcome
pub(crate) async fn check_pool(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();

    let result = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await;

    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(_) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: Utc::now(),
        },
        Err(e) => HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(format!("Database error: {}", e)),
            checked_at: Utc::now(),
        },
    }
}

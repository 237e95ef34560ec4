//! Infrastructure Database Layer
//!
//! This crate provides the PostgreSQL persistence for the academy fee ledger
//! using SQLx.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. Repositories own the SQL and
//! return plain row structs; adapters implement the `domain_fees` ports on
//! top of them and translate rows into domain types.
//!
//! # Concurrency
//!
//! - Invoice generation relies on `ON CONFLICT (enrollment_id, month, year)
//!   DO NOTHING`, so concurrent generators never duplicate an invoice.
//! - Settlement locks the student's open invoices with `FOR UPDATE` and
//!   guards every update on the previously read paid amount.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresFeeLedgerAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/academy")).await?;
//! run_migrations(&pool).await?;
//! let ledger = PostgresFeeLedgerAdapter::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, DatabaseConfig, create_pool, run_migrations};
pub use error::DatabaseError;
pub use adapters::{PostgresFeeLedgerAdapter, PostgresStudentDirectory};

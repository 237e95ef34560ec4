//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! fee ledger test suite.
//!
//! # Modules
//!
//! - `fixtures`: Ready-made dates, amounts and a wired in-memory ledger
//! - `builders`: Builder patterns for invoices, fee structures and students
//! - `database`: Postgres testcontainer management
//! - `assertions`: Ledger invariant assertions
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;

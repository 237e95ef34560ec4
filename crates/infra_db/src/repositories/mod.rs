//! Repository implementations for the ledger tables
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! plain row structs. Conversion into domain types happens in the adapters.
//!
//! # Architecture
//!
//! Each repository follows these principles:
//! - Runtime-checked queries with `sqlx::query_as` and `FromRow` rows
//! - Transaction support through connection-scoped `*_in` functions
//! - Optimistic guards on every invoice update

pub mod fees;
pub mod students;

pub use fees::FeeRepository;
pub use students::StudentRepository;

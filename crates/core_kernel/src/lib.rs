//! Core Kernel - Foundational types for the academy fee ledger
//!
//! This crate provides the building blocks shared by the fee domain, the
//! database layer and the HTTP API:
//! - Money with precise decimal arithmetic
//! - Billing periods (month/year) and academy-local dates
//! - Strongly-typed identifiers
//! - Port abstractions for swappable adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;

pub use money::{Money, MoneyError, MAX_AMOUNT};
pub use temporal::{BillingPeriod, TemporalError, Timezone};
pub use identifiers::{
    StudentId, FeeStructureId, EnrollmentId, InvoiceId, PaymentId, AllocationId,
};
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
    OperationMetadata,
};

//! Fee Domain - Monthly Invoices and Payment Distribution
//!
//! This crate implements the academy's fee ledger: recurring charges, the
//! enrollments that bill them, monthly invoices, and the distribution of
//! payments across those invoices.
//!
//! # Ledger Rules
//!
//! - At most one invoice per enrollment per billing period
//! - `0 <= paid_amount <= amount` on every invoice, and its status always
//!   follows from the two amounts (`pending`, `partial`, `paid`)
//! - Payments are applied oldest period first; whatever cannot be applied is
//!   returned as a remainder
//! - Every applied share of a payment leaves an allocation row
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_fees::{FeeLedgerService, CollectPaymentRequest};
//!
//! let receipt = service
//!     .collect_payment(CollectPaymentRequest {
//!         student_id,
//!         amount: dec!(2500),
//!         payment_method: "cash".into(),
//!         notes: None,
//!     }, None)
//!     .await?;
//!
//! assert_eq!(receipt.remainder.amount(), dec!(500));
//! ```

pub mod fee_structure;
pub mod enrollment;
pub mod invoice;
pub mod payment;
pub mod generator;
pub mod distribution;
pub mod calculation;
pub mod config;
pub mod ports;
pub mod service;
pub mod error;

pub use fee_structure::FeeStructure;
pub use enrollment::{EnrolledCharge, Enrollment, EnrollmentStatus};
pub use invoice::{Invoice, InvoiceStatus};
pub use payment::{
    CollectPaymentRequest, CollectionReceipt, Payment, PaymentAllocation, PaymentMethod,
    PaymentWithAllocations,
};
pub use generator::{GenerationFailure, GenerationReport};
pub use distribution::{plan_distribution, Application, DistributionPlan};
pub use calculation::{ChargeBreakdown, FeeCalculation};
pub use config::{BillingConfig, OverpaymentPolicy, DEFAULT_DUE_DAY};
pub use ports::{FeeLedgerPort, Settlement, Student, StudentDirectory};
pub use service::{FeeLedgerService, NewEnrollment, NewFeeStructure};
pub use error::FeeError;

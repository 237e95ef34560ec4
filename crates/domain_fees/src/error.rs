//! Fee domain errors

use core_kernel::{MoneyError, PortError, TemporalError};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur in the fee domain
#[derive(Debug, Error)]
pub enum FeeError {
    /// Input rejected before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Student missing from the directory
    #[error("Unknown student: {0}")]
    UnknownStudent(String),

    /// Student exists but may not be billed
    #[error("Student {0} is not active")]
    InactiveStudent(String),

    /// Fee structure not found
    #[error("Fee structure not found: {0}")]
    FeeStructureNotFound(String),

    /// Enrollment not found
    #[error("Enrollment not found: {0}")]
    EnrollmentNotFound(String),

    /// A fee structure with the same name already exists
    #[error("Fee structure already exists: {0}")]
    DuplicateFeeStructure(String),

    /// Payment exceeds the outstanding balance under the reject policy
    #[error("Payment of {amount} exceeds outstanding balance of {outstanding}")]
    Overpayment {
        amount: Decimal,
        outstanding: Decimal,
    },

    /// Invoice fields break the paid/status invariant
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),

    /// Money arithmetic failed
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Period or date construction failed
    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    /// Underlying store failed
    #[error("Ledger store error: {0}")]
    Port(#[from] PortError),
}

impl FeeError {
    pub fn validation(message: impl Into<String>) -> Self {
        FeeError::Validation(message.into())
    }

    /// True for errors caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            FeeError::Validation(_)
                | FeeError::UnknownStudent(_)
                | FeeError::InactiveStudent(_)
                | FeeError::Overpayment { .. }
                | FeeError::Money(_)
                | FeeError::Temporal(_)
        )
    }

    /// True for missing referenced entities
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FeeError::FeeStructureNotFound(_) | FeeError::EnrollmentNotFound(_)
        ) || matches!(self, FeeError::Port(e) if e.is_not_found())
    }
}

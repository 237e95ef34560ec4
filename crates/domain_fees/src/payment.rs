//! Payment receipts and their allocation trail

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{AllocationId, InvoiceId, Money, PaymentId, StudentId};
use crate::error::FeeError;

/// How the money was received, e.g. "cash" or "upi"
///
/// Stored trimmed and lowercased. The set of methods is open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentMethod(String);

impl PaymentMethod {
    pub fn parse(raw: &str) -> Result<Self, FeeError> {
        let method = raw.trim().to_lowercase();
        if method.is_empty() {
            return Err(FeeError::validation("Payment method is required"));
        }
        Ok(Self(method))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PaymentMethod {
    type Error = FeeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PaymentMethod::parse(&value)
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        method.0
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable receipt of money received from a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Paying student
    pub student_id: StudentId,
    /// Amount received, always positive
    pub amount: Money,
    /// When the money was received
    pub payment_date: DateTime<Utc>,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Notes
    pub notes: Option<String>,
}

impl Payment {
    /// Creates a receipt
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not positive or the method is blank.
    pub fn new(
        student_id: StudentId,
        amount: Decimal,
        payment_method: &str,
        notes: Option<String>,
    ) -> Result<Self, FeeError> {
        let amount = Money::positive(amount)?;
        let payment_method = PaymentMethod::parse(payment_method)?;

        Ok(Self {
            id: PaymentId::new_v7(),
            student_id,
            amount,
            payment_date: Utc::now(),
            payment_method,
            notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        })
    }
}

/// The share of a payment applied to one invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub id: AllocationId,
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    /// Always positive
    pub applied_amount: Money,
    pub allocated_at: DateTime<Utc>,
}

/// A payment together with the allocations written for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentWithAllocations {
    pub payment: Payment,
    pub allocations: Vec<PaymentAllocation>,
}

impl PaymentWithAllocations {
    /// Sum of applied amounts
    pub fn allocated(&self) -> Money {
        self.allocations
            .iter()
            .fold(Money::zero(), |total, a| total + a.applied_amount)
    }

    /// Portion of the payment that was not applied to any invoice
    pub fn unallocated(&self) -> Money {
        self.payment.amount.saturating_sub(&self.allocated())
    }
}

/// Input of the collection action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectPaymentRequest {
    pub student_id: StudentId,
    pub amount: Decimal,
    pub payment_method: String,
    pub notes: Option<String>,
}

/// Outcome of the collection action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReceipt {
    pub payment_id: PaymentId,
    pub amount_applied: Money,
    pub remainder: Money,
    pub allocations: Vec<PaymentAllocation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_payment_method_is_normalized() {
        let method = PaymentMethod::parse("  UPI ").unwrap();
        assert_eq!(method.as_str(), "upi");
        assert!(PaymentMethod::parse("   ").is_err());
    }

    #[test]
    fn test_payment_rejects_non_positive_amount() {
        let student = StudentId::new();
        assert!(Payment::new(student, dec!(0), "cash", None).is_err());
        assert!(Payment::new(student, dec!(-10), "cash", None).is_err());
        assert!(Payment::new(student, dec!(10), "", None).is_err());
    }

    #[test]
    fn test_unallocated_remainder() {
        let payment = Payment::new(StudentId::new(), dec!(2500), "cash", None).unwrap();
        let allocation = PaymentAllocation {
            id: AllocationId::new(),
            payment_id: payment.id,
            invoice_id: InvoiceId::new(),
            applied_amount: Money::new(dec!(2000)),
            allocated_at: Utc::now(),
        };
        let record = PaymentWithAllocations {
            payment,
            allocations: vec![allocation],
        };

        assert_eq!(record.allocated().amount(), dec!(2000));
        assert_eq!(record.unallocated().amount(), dec!(500));
    }

    #[test]
    fn test_payment_method_deserialize_rejects_blank() {
        let parsed: Result<PaymentMethod, _> = serde_json::from_str("\"  \"");
        assert!(parsed.is_err());
    }
}

//! Student fee invoices
//!
//! One invoice exists per enrollment per billing period. Invoices are created
//! by the generator, mutated only by the distributor and never deleted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BillingPeriod, EnrollmentId, InvoiceId, Money, StudentId};
use crate::enrollment::EnrolledCharge;
use crate::error::FeeError;

/// Invoice status, always derived from `amount` and `paid_amount`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Nothing paid yet
    Pending,
    /// Partially paid
    Partial,
    /// Fully paid
    Paid,
}

impl InvoiceStatus {
    /// The status an invoice must carry for the given amounts
    pub fn for_amounts(amount: Money, paid_amount: Money) -> Self {
        if paid_amount >= amount {
            InvoiceStatus::Paid
        } else if paid_amount.is_positive() {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Pending
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, InvoiceStatus::Paid)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvoiceStatus::Pending),
            "partial" => Ok(InvoiceStatus::Partial),
            "paid" => Ok(InvoiceStatus::Paid),
            other => Err(FeeError::ConsistencyViolation(format!(
                "unknown invoice status '{other}'"
            ))),
        }
    }
}

/// One period's billable charge for one enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Student being billed
    pub student_id: StudentId,
    /// Enrollment the charge belongs to
    pub enrollment_id: EnrollmentId,
    /// Billing month
    pub period: BillingPeriod,
    /// Amount charged, fixed at generation time
    pub amount: Money,
    /// Amount applied so far
    pub paid_amount: Money,
    /// Derived status
    pub status: InvoiceStatus,
    /// Due date within the period
    pub due_date: NaiveDate,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Drafts a pending invoice for an enrolled charge in the given period
    ///
    /// The amount is the fee structure's current amount. The due date is
    /// `due_day` of the period, clamped to the last day of the month.
    pub fn generate(
        charge: &EnrolledCharge,
        period: BillingPeriod,
        due_day: u32,
    ) -> Result<Self, FeeError> {
        let due_date = period.due_date(due_day)?;
        let now = Utc::now();

        Ok(Self {
            id: InvoiceId::new_v7(),
            student_id: charge.enrollment.student_id,
            enrollment_id: charge.enrollment.id,
            period,
            amount: charge.fee_structure.amount,
            paid_amount: Money::zero(),
            status: InvoiceStatus::Pending,
            due_date,
            created_at: now,
            updated_at: now,
        })
    }

    /// Amount still owed; zero or negative means nothing is due
    pub fn balance_due(&self) -> Money {
        self.amount - self.paid_amount
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// Overdue when not paid and the due date is strictly before `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_paid() && self.due_date < today
    }

    /// Applies a share of a payment, returning the new status
    ///
    /// `applied` must not exceed the balance due; the distributor guarantees
    /// this before calling.
    pub fn apply(&mut self, applied: Money) -> Result<InvoiceStatus, FeeError> {
        if !applied.is_positive() || applied > self.balance_due() {
            return Err(FeeError::ConsistencyViolation(format!(
                "cannot apply {} to invoice {} with balance {}",
                applied,
                self.id,
                self.balance_due()
            )));
        }
        self.paid_amount += applied;
        self.status = InvoiceStatus::for_amounts(self.amount, self.paid_amount);
        self.updated_at = Utc::now();
        Ok(self.status)
    }
}

/// Orders invoices oldest period first, then by due date and id
pub fn settlement_order(a: &Invoice, b: &Invoice) -> std::cmp::Ordering {
    a.period
        .cmp(&b.period)
        .then(a.due_date.cmp(&b.due_date))
        .then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::Enrollment;
    use crate::fee_structure::FeeStructure;
    use core_kernel::StudentId;
    use rust_decimal_macros::dec;

    fn charge(amount: rust_decimal::Decimal) -> EnrolledCharge {
        let fee_structure = FeeStructure::new("Football", amount, None).unwrap();
        let enrollment = Enrollment::new(
            StudentId::new(),
            fee_structure.id,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        EnrolledCharge { enrollment, fee_structure }
    }

    #[test]
    fn test_status_for_amounts() {
        let amount = Money::new(dec!(100));
        assert_eq!(InvoiceStatus::for_amounts(amount, Money::zero()), InvoiceStatus::Pending);
        assert_eq!(InvoiceStatus::for_amounts(amount, Money::new(dec!(0.01))), InvoiceStatus::Partial);
        assert_eq!(InvoiceStatus::for_amounts(amount, amount), InvoiceStatus::Paid);
    }

    #[test]
    fn test_generate_uses_current_amount_and_due_day() {
        let period = BillingPeriod::new(2, 2024).unwrap();
        let invoice = Invoice::generate(&charge(dec!(2000)), period, 31).unwrap();

        assert_eq!(invoice.amount.amount(), dec!(2000));
        assert!(invoice.paid_amount.is_zero());
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_overdue_boundary() {
        let period = BillingPeriod::new(3, 2024).unwrap();
        let invoice = Invoice::generate(&charge(dec!(500)), period, 5).unwrap();
        let due = invoice.due_date;

        assert!(!invoice.is_overdue(due));
        assert!(invoice.is_overdue(due.succ_opt().unwrap()));
        assert!(!invoice.is_overdue(due.pred_opt().unwrap()));
    }

    #[test]
    fn test_apply_partial_then_paid() {
        let period = BillingPeriod::new(3, 2024).unwrap();
        let mut invoice = Invoice::generate(&charge(dec!(500)), period, 5).unwrap();

        assert_eq!(invoice.apply(Money::new(dec!(200))).unwrap(), InvoiceStatus::Partial);
        assert_eq!(invoice.apply(Money::new(dec!(300))).unwrap(), InvoiceStatus::Paid);
        assert!(invoice.balance_due().is_zero());
        assert!(matches!(
            invoice.apply(Money::new(dec!(1))),
            Err(FeeError::ConsistencyViolation(_))
        ));
        assert_eq!(invoice.paid_amount.amount(), dec!(500));
        assert_eq!(invoice.status, InvoiceStatus::Paid);
    }
}

//! Payment distribution
//!
//! Applies an amount across a student's open invoices, oldest period first.
//! Planning is pure: adapters load and lock the open invoices, call
//! [`plan_distribution`], then persist every [`Application`] in the same
//! unit of work. Nothing here touches storage.
//!
//! Guarantees of a plan:
//! - `paid_amount` never decreases and never exceeds `amount`
//! - `Σ applied + remainder = amount`
//! - every resulting status matches its amounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use core_kernel::{AllocationId, BillingPeriod, InvoiceId, Money, MoneyError, PaymentId};
use crate::invoice::{settlement_order, Invoice, InvoiceStatus};
use crate::payment::PaymentAllocation;

/// One invoice update produced by a distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub invoice_id: InvoiceId,
    pub period: BillingPeriod,
    pub applied: Money,
    /// `paid_amount` read before the update, used as a guard when persisting
    pub previous_paid: Money,
    pub new_paid: Money,
    pub new_status: InvoiceStatus,
}

/// The full outcome of distributing an amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionPlan {
    pub amount: Money,
    pub applications: Vec<Application>,
    pub remainder: Money,
    /// Open invoices skipped because nothing was due on them
    pub skipped: Vec<InvoiceId>,
}

impl DistributionPlan {
    pub fn total_applied(&self) -> Money {
        // partial sums never exceed `amount`
        self.applications
            .iter()
            .fold(Money::zero(), |total, a| total + a.applied)
    }

    /// True when part of the amount could not be applied
    pub fn is_overpayment(&self) -> bool {
        self.remainder.is_positive()
    }

    /// Allocation rows describing this plan for a recorded payment
    pub fn allocations(&self, payment_id: PaymentId, at: DateTime<Utc>) -> Vec<PaymentAllocation> {
        self.applications
            .iter()
            .map(|a| PaymentAllocation {
                id: AllocationId::new_v7(),
                payment_id,
                invoice_id: a.invoice_id,
                applied_amount: a.applied,
                allocated_at: at,
            })
            .collect()
    }
}

/// Plans how `amount` is spread across `invoices`
///
/// Paid invoices in the input are ignored. Open invoices are visited in
/// `(period, due_date, id)` order until the amount is exhausted. An open
/// invoice with nothing due is a consistency violation: it is logged and
/// skipped.
pub fn plan_distribution(invoices: &[Invoice], amount: Money) -> DistributionPlan {
    let mut open: Vec<&Invoice> = invoices.iter().filter(|i| i.status.is_open()).collect();
    open.sort_by(|a, b| settlement_order(a, b));

    let mut remaining = amount.max(Money::zero());
    let mut applications = Vec::new();
    let mut skipped = Vec::new();

    for invoice in open {
        if !remaining.is_positive() {
            break;
        }

        let due = invoice.balance_due();
        if !due.is_positive() {
            warn!(
                invoice_id = %invoice.id,
                amount = %invoice.amount,
                paid_amount = %invoice.paid_amount,
                status = %invoice.status,
                "Open invoice has nothing due, skipping"
            );
            skipped.push(invoice.id);
            continue;
        }

        let applied = remaining.min(due);
        let new_paid = invoice.paid_amount + applied;
        applications.push(Application {
            invoice_id: invoice.id,
            period: invoice.period,
            applied,
            previous_paid: invoice.paid_amount,
            new_paid,
            new_status: InvoiceStatus::for_amounts(invoice.amount, new_paid),
        });
        remaining -= applied;
    }

    DistributionPlan {
        amount,
        applications,
        remainder: remaining,
        skipped,
    }
}

/// Outstanding balance across the open invoices given
///
/// # Errors
///
/// Returns `MoneyError::Overflow` if the balances do not fit in a decimal
pub fn outstanding_balance(invoices: &[Invoice]) -> Result<Money, MoneyError> {
    Money::checked_sum(
        invoices
            .iter()
            .filter(|i| i.status.is_open())
            .map(|i| i.balance_due().max(Money::zero())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{EnrollmentId, StudentId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn invoice(month: u32, year: i32, amount: Decimal, paid: Decimal) -> Invoice {
        let amount = Money::new(amount);
        let paid_amount = Money::new(paid);
        Invoice {
            id: InvoiceId::new(),
            student_id: StudentId::new(),
            enrollment_id: EnrollmentId::new(),
            period: BillingPeriod::new(month, year).unwrap(),
            amount,
            paid_amount,
            status: InvoiceStatus::for_amounts(amount, paid_amount),
            due_date: NaiveDate::from_ymd_opt(year, month, 5).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_oldest_period_first() {
        // Given out of order on purpose
        let feb = invoice(2, 2024, dec!(300), dec!(0));
        let jan = invoice(1, 2024, dec!(500), dec!(0));
        let plan = plan_distribution(&[feb.clone(), jan.clone()], Money::new(dec!(600)));

        assert_eq!(plan.applications.len(), 2);
        assert_eq!(plan.applications[0].invoice_id, jan.id);
        assert_eq!(plan.applications[0].applied.amount(), dec!(500));
        assert_eq!(plan.applications[0].new_status, InvoiceStatus::Paid);
        assert_eq!(plan.applications[1].invoice_id, feb.id);
        assert_eq!(plan.applications[1].applied.amount(), dec!(100));
        assert_eq!(plan.applications[1].new_status, InvoiceStatus::Partial);
        assert!(plan.remainder.is_zero());
    }

    #[test]
    fn test_remainder_on_overpayment() {
        let only = invoice(3, 2024, dec!(2000), dec!(0));
        let plan = plan_distribution(&[only], Money::new(dec!(2500)));

        assert_eq!(plan.total_applied().amount(), dec!(2000));
        assert_eq!(plan.remainder.amount(), dec!(500));
        assert!(plan.is_overpayment());
    }

    #[test]
    fn test_year_boundary_ordering() {
        let jan = invoice(1, 2025, dec!(100), dec!(0));
        let december = invoice(12, 2024, dec!(100), dec!(0));
        let plan = plan_distribution(&[jan, december.clone()], Money::new(dec!(50)));

        assert_eq!(plan.applications.len(), 1);
        assert_eq!(plan.applications[0].invoice_id, december.id);
    }

    #[test]
    fn test_partial_invoice_continues_from_paid_amount() {
        let partial = invoice(1, 2024, dec!(500), dec!(200));
        let plan = plan_distribution(&[partial], Money::new(dec!(300)));

        let application = &plan.applications[0];
        assert_eq!(application.previous_paid.amount(), dec!(200));
        assert_eq!(application.new_paid.amount(), dec!(500));
        assert_eq!(application.new_status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_paid_invoices_ignored() {
        let paid = invoice(1, 2024, dec!(500), dec!(500));
        let plan = plan_distribution(&[paid], Money::new(dec!(100)));

        assert!(plan.applications.is_empty());
        assert_eq!(plan.remainder.amount(), dec!(100));
    }

    #[test]
    fn test_inconsistent_open_invoice_is_skipped() {
        let mut broken = invoice(1, 2024, dec!(500), dec!(0));
        broken.paid_amount = Money::new(dec!(500));
        let next = invoice(2, 2024, dec!(500), dec!(0));
        let plan = plan_distribution(&[broken.clone(), next.clone()], Money::new(dec!(100)));

        assert_eq!(plan.skipped, vec![broken.id]);
        assert_eq!(plan.applications[0].invoice_id, next.id);
    }

    #[test]
    fn test_allocations_mirror_applications() {
        let jan = invoice(1, 2024, dec!(500), dec!(0));
        let feb = invoice(2, 2024, dec!(300), dec!(0));
        let plan = plan_distribution(&[jan, feb], Money::new(dec!(600)));
        let payment_id = PaymentId::new();
        let allocations = plan.allocations(payment_id, Utc::now());

        let total = Money::checked_sum(allocations.iter().map(|a| a.applied_amount)).unwrap();
        assert_eq!(total, plan.total_applied());
        assert!(allocations.iter().all(|a| a.payment_id == payment_id));
    }

    #[test]
    fn test_outstanding_balance() {
        let invoices = vec![
            invoice(1, 2024, dec!(500), dec!(500)),
            invoice(2, 2024, dec!(500), dec!(200)),
            invoice(3, 2024, dec!(500), dec!(0)),
        ];
        assert_eq!(outstanding_balance(&invoices).unwrap().amount(), dec!(800));
    }
}

//! Fee calculation view
//!
//! A read-only aggregation recomputed from invoices on every read.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{EnrollmentId, FeeStructureId, Money, MoneyError};
use crate::enrollment::EnrolledCharge;
use crate::invoice::Invoice;

/// Pending balance for one active enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeBreakdown {
    pub enrollment_id: EnrollmentId,
    pub fee_structure_id: FeeStructureId,
    pub fee_structure_name: String,
    pub monthly_amount: Money,
    pub pending_amount: Money,
}

/// What a student owes and what to suggest collecting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeCalculation {
    /// Sum of current fee structure amounts over active enrollments
    pub monthly_fee: Money,
    /// Sum of `paid_amount` over all invoices
    pub total_paid: Money,
    /// Total owed minus total paid
    pub pending_amount: Money,
    /// Balance of open invoices whose due date is before today
    pub overdue_amount: Money,
    /// Pending amount if positive, otherwise the monthly fee
    pub suggested_amount: Money,
    pub per_charge: Vec<ChargeBreakdown>,
}

impl FeeCalculation {
    /// Aggregates active charges and all of a student's invoices as of `today`
    ///
    /// # Arguments
    ///
    /// * `charges` - Enrollments joined with their fee structures; inactive ones are ignored
    /// * `invoices` - Every invoice of the student, paid or not
    /// * `today` - Date in the academy timezone used for the overdue cut-off
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` when a total leaves the decimal range
    pub fn compute(
        charges: &[EnrolledCharge],
        invoices: &[Invoice],
        today: NaiveDate,
    ) -> Result<Self, MoneyError> {
        let active: Vec<&EnrolledCharge> =
            charges.iter().filter(|c| c.enrollment.is_active()).collect();

        let monthly_fee = Money::checked_sum(active.iter().map(|c| c.fee_structure.amount))?;
        let total_paid = Money::checked_sum(invoices.iter().map(|i| i.paid_amount))?;
        let total_owed = Money::checked_sum(invoices.iter().map(|i| i.amount))?;
        let pending_amount = total_owed.checked_sub(&total_paid)?;
        let overdue_amount = Money::checked_sum(
            invoices
                .iter()
                .filter(|i| i.is_overdue(today))
                .map(|i| i.balance_due()),
        )?;
        let suggested_amount = if pending_amount.is_positive() {
            pending_amount
        } else {
            monthly_fee
        };

        let per_charge = active
            .iter()
            .map(|c| {
                let pending_amount = Money::checked_sum(
                    invoices
                        .iter()
                        .filter(|i| i.enrollment_id == c.enrollment.id)
                        .map(|i| i.balance_due()),
                )?;
                Ok(ChargeBreakdown {
                    enrollment_id: c.enrollment.id,
                    fee_structure_id: c.fee_structure.id,
                    fee_structure_name: c.fee_structure.name.clone(),
                    monthly_amount: c.fee_structure.amount,
                    pending_amount,
                })
            })
            .collect::<Result<Vec<_>, MoneyError>>()?;

        Ok(Self {
            monthly_fee,
            total_paid,
            pending_amount,
            overdue_amount,
            suggested_amount,
            per_charge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::Enrollment;
    use crate::fee_structure::FeeStructure;
    use core_kernel::{BillingPeriod, StudentId};
    use rust_decimal_macros::dec;

    fn charge(amount: rust_decimal::Decimal) -> EnrolledCharge {
        let fee_structure = FeeStructure::new("Cricket", amount, None).unwrap();
        let enrollment = Enrollment::new(
            StudentId::new(),
            fee_structure.id,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        EnrolledCharge { enrollment, fee_structure }
    }

    #[test]
    fn test_no_invoices_suggests_monthly_fee() {
        let charges = vec![charge(dec!(2000))];
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let view = FeeCalculation::compute(&charges, &[], today).unwrap();

        assert_eq!(view.monthly_fee.amount(), dec!(2000));
        assert!(view.pending_amount.is_zero());
        assert_eq!(view.suggested_amount.amount(), dec!(2000));
        assert_eq!(view.per_charge.len(), 1);
    }

    #[test]
    fn test_pending_and_overdue() {
        let charges = vec![charge(dec!(2000))];
        let period = BillingPeriod::new(3, 2024).unwrap();
        let mut invoice = Invoice::generate(&charges[0], period, 5).unwrap();
        invoice.apply(Money::new(dec!(500))).unwrap();

        let on_due_date =
            FeeCalculation::compute(&charges, &[invoice.clone()], invoice.due_date).unwrap();
        assert_eq!(on_due_date.pending_amount.amount(), dec!(1500));
        assert!(on_due_date.overdue_amount.is_zero());
        assert_eq!(on_due_date.suggested_amount.amount(), dec!(1500));
        assert_eq!(on_due_date.per_charge[0].pending_amount.amount(), dec!(1500));

        let day_after = invoice.due_date.succ_opt().unwrap();
        let late = FeeCalculation::compute(&charges, &[invoice], day_after).unwrap();
        assert_eq!(late.overdue_amount.amount(), dec!(1500));
        assert_eq!(late.total_paid.amount(), dec!(500));
    }

    #[test]
    fn test_inactive_enrollment_excluded_from_monthly_fee() {
        let mut dropped = charge(dec!(800));
        dropped.enrollment.deactivate();
        let charges = vec![charge(dec!(1000)), dropped];
        let view = FeeCalculation::compute(&charges, &[], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap();

        assert_eq!(view.monthly_fee.amount(), dec!(1000));
        assert_eq!(view.per_charge.len(), 1);
    }
    #[test]
    fn test_totals_beyond_decimal_range_are_errors() {
        let charges = vec![charge(dec!(2000))];
        let period = BillingPeriod::new(3, 2024).unwrap();
        let mut first = Invoice::generate(&charges[0], period, 5).unwrap();
        first.amount = Money::new(rust_decimal::Decimal::MAX);
        let mut second = first.clone();
        second.period = period.next();

        let result = FeeCalculation::compute(&charges, &[first, second], period.first_day());
        assert_eq!(result.unwrap_err(), MoneyError::Overflow);
    }
}

//! Monthly invoice generation

use serde::{Deserialize, Serialize};

use core_kernel::{BillingPeriod, EnrollmentId, InvoiceId};
use crate::enrollment::EnrolledCharge;
use crate::error::FeeError;
use crate::invoice::Invoice;

/// Drafts one pending invoice per active charge for `period`
///
/// Inactive enrollments are left out. Each draft is returned alongside the
/// enrollment it was built for so callers can isolate per-enrollment failures.
pub fn draft_invoices(
    charges: &[EnrolledCharge],
    period: BillingPeriod,
    due_day: u32,
) -> Vec<(EnrollmentId, Result<Invoice, FeeError>)> {
    charges
        .iter()
        .filter(|c| c.enrollment.is_active())
        .map(|c| (c.enrollment.id, Invoice::generate(c, period, due_day)))
        .collect()
}

/// A generation failure for one enrollment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub enrollment_id: EnrollmentId,
    pub reason: String,
}

/// Summary of one generator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
    pub period: BillingPeriod,
    /// Invoices inserted by this run
    pub created: Vec<InvoiceId>,
    /// Enrollments that already had an invoice for the period
    pub existing: Vec<EnrollmentId>,
    pub failed: Vec<GenerationFailure>,
}

impl GenerationReport {
    pub fn new(period: BillingPeriod) -> Self {
        Self {
            period,
            created: Vec::new(),
            existing: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record_failure(&mut self, enrollment_id: EnrollmentId, reason: impl ToString) {
        self.failed.push(GenerationFailure {
            enrollment_id,
            reason: reason.to_string(),
        });
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::Enrollment;
    use crate::fee_structure::FeeStructure;
    use chrono::NaiveDate;
    use core_kernel::StudentId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_draft_skips_inactive_enrollments() {
        let student = StudentId::new();
        let fee = FeeStructure::new("Swimming", dec!(1200), None).unwrap();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let active = Enrollment::new(student, fee.id, start);
        let mut dropped = Enrollment::new(student, fee.id, start);
        dropped.deactivate();

        let charges = vec![
            EnrolledCharge { enrollment: active.clone(), fee_structure: fee.clone() },
            EnrolledCharge { enrollment: dropped, fee_structure: fee },
        ];
        let period = BillingPeriod::new(4, 2024).unwrap();
        let drafts = draft_invoices(&charges, period, 5);

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].0, active.id);
        let invoice = drafts[0].1.as_ref().unwrap();
        assert_eq!(invoice.period, period);
        assert_eq!(invoice.student_id, student);
    }

    #[test]
    fn test_report_failures() {
        let mut report = GenerationReport::new(BillingPeriod::new(1, 2024).unwrap());
        assert!(report.is_complete());
        report.record_failure(EnrollmentId::new(), "connection reset");
        assert!(!report.is_complete());
        assert_eq!(report.failed[0].reason, "connection reset");
    }
}

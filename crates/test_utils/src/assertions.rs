//! Custom Test Assertions
//!
//! Ledger invariant checks with messages that name the offending invoice.

use rust_decimal::Decimal;

use core_kernel::Money;
use domain_fees::{CollectionReceipt, DistributionPlan, Invoice, InvoiceStatus};

/// Asserts that a Money value equals a decimal amount
pub fn assert_money_eq(actual: Money, expected: Decimal) {
    assert_eq!(
        actual,
        Money::new(expected),
        "Money mismatch: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts `0 <= paid_amount <= amount` and the status that follows from it
pub fn assert_invoice_consistent(invoice: &Invoice) {
    assert!(
        !invoice.paid_amount.is_negative(),
        "Invoice {} has negative paid amount {}",
        invoice.id,
        invoice.paid_amount
    );
    assert!(
        invoice.paid_amount <= invoice.amount,
        "Invoice {} overpaid: paid {} of {}",
        invoice.id,
        invoice.paid_amount,
        invoice.amount
    );
    assert_eq!(
        invoice.status,
        InvoiceStatus::for_amounts(invoice.amount, invoice.paid_amount),
        "Invoice {} status {} does not match paid {} of {}",
        invoice.id,
        invoice.status,
        invoice.paid_amount,
        invoice.amount
    );
}

/// Asserts every invoice is consistent and no period is billed twice per enrollment
pub fn assert_ledger_consistent(invoices: &[Invoice]) {
    let mut keys = std::collections::HashSet::new();
    for invoice in invoices {
        assert_invoice_consistent(invoice);
        assert!(
            keys.insert((invoice.enrollment_id, invoice.period)),
            "Enrollment {} billed twice for {}",
            invoice.enrollment_id,
            invoice.period
        );
    }
}

/// Asserts `Σ applied + remainder = amount` for a plan
pub fn assert_conserved(plan: &DistributionPlan) {
    assert_eq!(
        plan.total_applied() + plan.remainder,
        plan.amount,
        "Distribution leaked money: applied {} + remainder {} != {}",
        plan.total_applied(),
        plan.remainder,
        plan.amount
    );
}

/// Asserts the allocation trail of a receipt sums to the applied amount
pub fn assert_receipt_balanced(receipt: &CollectionReceipt, paid: Decimal) {
    let allocated = Money::checked_sum(receipt.allocations.iter().map(|a| a.applied_amount))
        .expect("allocations overflow");
    assert_eq!(
        allocated, receipt.amount_applied,
        "Allocations sum to {} but {} was applied",
        allocated, receipt.amount_applied
    );
    assert_money_eq(receipt.amount_applied + receipt.remainder, paid);
    assert!(
        receipt.allocations.iter().all(|a| a.applied_amount.is_positive()),
        "Receipt {} has a non-positive allocation",
        receipt.payment_id
    );
}

/// Asserts invoices are ordered oldest period first
pub fn assert_oldest_first(invoices: &[Invoice]) {
    for pair in invoices.windows(2) {
        assert!(
            pair[0].period <= pair[1].period,
            "Invoice for {} listed before {}",
            pair[0].period,
            pair[1].period
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::InvoiceBuilder;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_invoice_consistent_passes() {
        assert_invoice_consistent(&InvoiceBuilder::new().with_paid(dec!(100)).build());
    }

    #[test]
    #[should_panic(expected = "overpaid")]
    fn test_assert_invoice_consistent_catches_overpay() {
        let invoice = InvoiceBuilder::new()
            .with_amount(dec!(100))
            .with_paid(dec!(150))
            .build();
        assert_invoice_consistent(&invoice);
    }

    #[test]
    #[should_panic(expected = "billed twice")]
    fn test_assert_ledger_consistent_catches_duplicate_period() {
        let first = InvoiceBuilder::new().in_period(2, 2024).build();
        let duplicate = InvoiceBuilder::new()
            .for_enrollment(first.enrollment_id)
            .in_period(2, 2024)
            .build();
        assert_ledger_consistent(&[first, duplicate]);
    }
}

//! Property tests for payment distribution

use std::collections::HashMap;

use proptest::prelude::*;

use core_kernel::{InvoiceId, Money};
use domain_fees::{plan_distribution, Invoice, InvoiceStatus};
use test_utils::{
    assert_conserved, assert_invoice_consistent, invoices_strategy, positive_money_strategy,
};

/// Applies a plan to a copy of the invoices the way an adapter would
fn apply_plan(invoices: &[Invoice], amount: Money) -> (Vec<Invoice>, domain_fees::DistributionPlan) {
    let plan = plan_distribution(invoices, amount);
    let mut by_id: HashMap<InvoiceId, Invoice> =
        invoices.iter().cloned().map(|i| (i.id, i)).collect();
    for application in &plan.applications {
        let invoice = by_id.get_mut(&application.invoice_id).unwrap();
        assert_eq!(invoice.paid_amount, application.previous_paid);
        invoice.paid_amount = application.new_paid;
        invoice.status = application.new_status;
    }
    let updated = invoices.iter().map(|i| by_id[&i.id].clone()).collect();
    (updated, plan)
}

proptest! {
    #[test]
    fn prop_distribution_conserves_amount(
        invoices in invoices_strategy(12),
        amount in positive_money_strategy(),
    ) {
        let plan = plan_distribution(&invoices, amount);
        assert_conserved(&plan);
        prop_assert!(!plan.remainder.is_negative());
    }

    #[test]
    fn prop_no_invoice_overpaid_and_status_consistent(
        invoices in invoices_strategy(12),
        amount in positive_money_strategy(),
    ) {
        let (updated, _) = apply_plan(&invoices, amount);
        for invoice in &updated {
            assert_invoice_consistent(invoice);
        }
    }

    #[test]
    fn prop_paid_amount_never_decreases(
        invoices in invoices_strategy(12),
        amount in positive_money_strategy(),
    ) {
        let (updated, plan) = apply_plan(&invoices, amount);
        for (before, after) in invoices.iter().zip(updated.iter()) {
            prop_assert!(after.paid_amount >= before.paid_amount);
        }
        prop_assert!(plan.applications.iter().all(|a| a.applied.is_positive()));
    }

    #[test]
    fn prop_oldest_period_settled_first(
        invoices in invoices_strategy(12),
        amount in positive_money_strategy(),
    ) {
        let plan = plan_distribution(&invoices, amount);

        for pair in plan.applications.windows(2) {
            prop_assert!(pair[0].period <= pair[1].period);
            // Only the last touched invoice may be left partially paid
            prop_assert_eq!(pair[0].new_status, InvoiceStatus::Paid);
        }

        // An untouched open invoice means the money ran out first
        let touched: Vec<InvoiceId> = plan.applications.iter().map(|a| a.invoice_id).collect();
        let untouched_open = invoices
            .iter()
            .any(|i| i.status.is_open() && !touched.contains(&i.id));
        if untouched_open {
            prop_assert!(plan.remainder.is_zero());
        }
    }

    #[test]
    fn prop_remainder_only_when_everything_paid(
        invoices in invoices_strategy(12),
        amount in positive_money_strategy(),
    ) {
        let (updated, plan) = apply_plan(&invoices, amount);
        if plan.remainder.is_positive() {
            prop_assert!(updated.iter().all(|i| i.status == InvoiceStatus::Paid));
        }
    }
}

//! Property-Based Test Generators
//!
//! Proptest strategies producing ledger data that already satisfies the
//! invoice invariants, so properties can focus on what distribution does.

use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::{BillingPeriod, Money, StudentId};
use domain_fees::Invoice;

use crate::builders::InvoiceBuilder;

/// Strategy for positive amounts in minor units, up to one million
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..100_000_000i64
}

/// Strategy for positive Money values
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(Money::from_minor)
}

/// Strategy for billing periods between 2020 and 2030
pub fn period_strategy() -> impl Strategy<Value = BillingPeriod> {
    (1u32..=12u32, 2020i32..=2030i32)
        .prop_map(|(month, year)| BillingPeriod::new(month, year).expect("month in range"))
}

/// Strategy for a consistent invoice of one student
///
/// `paid_amount` is anywhere from zero to the full amount, so paid invoices
/// are generated too.
pub fn invoice_strategy(student_id: StudentId) -> impl Strategy<Value = Invoice> {
    (period_strategy(), 1i64..1_000_000i64, 0u32..=100u32).prop_map(
        move |(period, amount_minor, paid_percent)| {
            let paid_minor = amount_minor * i64::from(paid_percent) / 100;
            InvoiceBuilder::new()
                .for_student(student_id)
                .in_period(period.month(), period.year())
                .with_amount(Decimal::new(amount_minor, 2))
                .with_paid(Decimal::new(paid_minor, 2))
                .build()
        },
    )
}

/// Strategy for up to `max` consistent invoices of one student
pub fn invoices_strategy(max: usize) -> impl Strategy<Value = Vec<Invoice>> {
    let student_id = StudentId::new();
    proptest::collection::vec(invoice_strategy(student_id), 0..=max)
}

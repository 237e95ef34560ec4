//! Test Data Builders
//!
//! Builders with sensible defaults so tests only spell out the fields they
//! care about.

use chrono::{NaiveDate, Utc};
use fake::faker::name::en::Name;
use fake::Fake;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{BillingPeriod, EnrollmentId, InvoiceId, Money, StudentId};
use domain_fees::{FeeStructure, Invoice, InvoiceStatus, Student};

use crate::fixtures::period;

/// Builder for directory students
pub struct StudentBuilder {
    id: StudentId,
    name: String,
    status: String,
}

impl Default for StudentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StudentBuilder {
    /// Creates an active student with a random name
    pub fn new() -> Self {
        Self {
            id: StudentId::new(),
            name: Name().fake(),
            status: "active".to_string(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn build(self) -> Student {
        Student::new(self.id, self.name, self.status)
    }
}

/// Builder for fee structures
pub struct FeeStructureBuilder {
    name: String,
    amount: Decimal,
    description: Option<String>,
}

impl Default for FeeStructureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FeeStructureBuilder {
    pub fn new() -> Self {
        Self {
            name: "Karate Monthly".to_string(),
            amount: dec!(2000),
            description: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// # Panics
    ///
    /// Panics if the name is blank or the amount is not positive
    pub fn build(self) -> FeeStructure {
        FeeStructure::new(self.name, self.amount, self.description)
            .expect("valid fee structure in builder")
    }
}

/// Builder for invoices with consistent status
///
/// The status is derived from amount and paid amount unless overridden with
/// [`InvoiceBuilder::with_status_unchecked`].
pub struct InvoiceBuilder {
    id: InvoiceId,
    student_id: StudentId,
    enrollment_id: EnrollmentId,
    period: BillingPeriod,
    amount: Decimal,
    paid_amount: Decimal,
    due_date: Option<NaiveDate>,
    status: Option<InvoiceStatus>,
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceBuilder {
    pub fn new() -> Self {
        Self {
            id: InvoiceId::new(),
            student_id: StudentId::new(),
            enrollment_id: EnrollmentId::new(),
            period: period(1, 2024),
            amount: dec!(2000),
            paid_amount: Decimal::ZERO,
            due_date: None,
            status: None,
        }
    }

    pub fn for_student(mut self, student_id: StudentId) -> Self {
        self.student_id = student_id;
        self
    }

    pub fn for_enrollment(mut self, enrollment_id: EnrollmentId) -> Self {
        self.enrollment_id = enrollment_id;
        self
    }

    pub fn in_period(mut self, month: u32, year: i32) -> Self {
        self.period = period(month, year);
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_paid(mut self, paid_amount: Decimal) -> Self {
        self.paid_amount = paid_amount;
        self
    }

    pub fn due_on(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Forces a status that may contradict the amounts
    pub fn with_status_unchecked(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(self) -> Invoice {
        let amount = Money::new(self.amount);
        let paid_amount = Money::new(self.paid_amount);
        let now = Utc::now();
        Invoice {
            id: self.id,
            student_id: self.student_id,
            enrollment_id: self.enrollment_id,
            period: self.period,
            amount,
            paid_amount,
            status: self
                .status
                .unwrap_or_else(|| InvoiceStatus::for_amounts(amount, paid_amount)),
            due_date: self
                .due_date
                .unwrap_or_else(|| self.period.first_day() + chrono::Days::new(4)),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_student_builder_defaults_to_active() {
        let student = StudentBuilder::new().build();
        assert!(student.is_active());
        assert!(!student.name.is_empty());
    }

    #[test]
    fn test_invoice_builder_derives_status() {
        let invoice = InvoiceBuilder::new()
            .with_amount(dec!(500))
            .with_paid(dec!(200))
            .build();
        assert_eq!(invoice.status, InvoiceStatus::Partial);
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
    }
}

//! Pre-built Test Fixtures
//!
//! Provides ready-to-use dates and a fully wired in-memory ledger.
//! Values are fixed so assertions stay predictable.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use core_kernel::{BillingPeriod, StudentId};
use domain_fees::ports::mock::{MockFeeLedger, MockStudentDirectory};
use domain_fees::{
    BillingConfig, Enrollment, FeeLedgerService, FeeStructure, NewEnrollment, NewFeeStructure,
    Student,
};

use crate::builders::StudentBuilder;

/// Creates a date, panicking on invalid input
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

/// Creates a billing period, panicking on invalid input
pub fn period(month: u32, year: i32) -> BillingPeriod {
    BillingPeriod::new(month, year).expect("valid fixture period")
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Enrollment start date (Jan 10, 2024)
    pub fn enrollment_start() -> NaiveDate {
        date(2024, 1, 10)
    }

    /// A day inside March 2024 after the default due day
    pub fn mid_march() -> NaiveDate {
        date(2024, 3, 15)
    }

    /// Default due date of March 2024
    pub fn march_due_date() -> NaiveDate {
        date(2024, 3, 5)
    }
}

/// An in-memory ledger with its service, ready for async tests
///
/// The mocks are shared with the service, so tests can seed data through
/// the fixture and observe effects through either side.
#[derive(Clone)]
pub struct LedgerFixture {
    pub ledger: Arc<MockFeeLedger>,
    pub students: Arc<MockStudentDirectory>,
    pub service: FeeLedgerService,
}

impl Default for LedgerFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerFixture {
    /// Creates a fixture with the default billing configuration
    pub fn new() -> Self {
        Self::with_config(BillingConfig::default())
    }

    pub fn with_config(config: BillingConfig) -> Self {
        let ledger = Arc::new(MockFeeLedger::new());
        let students = Arc::new(MockStudentDirectory::new());
        let service = FeeLedgerService::new(ledger.clone(), students.clone(), config);
        Self {
            ledger,
            students,
            service,
        }
    }

    /// Registers an active student with a generated name
    pub async fn active_student(&self) -> Student {
        let student = StudentBuilder::new().build();
        self.students.add_student(student.clone()).await;
        student
    }

    /// Registers a student with the given status
    pub async fn student_with_status(&self, status: &str) -> Student {
        let student = StudentBuilder::new().with_status(status).build();
        self.students.add_student(student.clone()).await;
        student
    }

    /// Creates a fee structure through the service
    pub async fn fee_structure(&self, name: &str, amount: Decimal) -> FeeStructure {
        self.service
            .create_fee_structure(
                NewFeeStructure {
                    name: name.to_string(),
                    amount,
                    description: None,
                },
                None,
            )
            .await
            .expect("fixture fee structure")
    }

    /// Enrolls a student through the service
    pub async fn enroll(&self, student_id: StudentId, fee_structure: &FeeStructure) -> Enrollment {
        self.service
            .create_enrollment(
                NewEnrollment {
                    student_id,
                    fee_structure_id: fee_structure.id,
                    start_date: Some(TemporalFixtures::enrollment_start()),
                },
                None,
            )
            .await
            .expect("fixture enrollment")
    }

    /// An active student with one enrollment at `amount` per month
    pub async fn enrolled_student(&self, amount: Decimal) -> (Student, FeeStructure, Enrollment) {
        let student = self.active_student().await;
        let fee = self
            .fee_structure(&format!("Program {}", student.id), amount)
            .await;
        let enrollment = self.enroll(student.id, &fee).await;
        (student, fee, enrollment)
    }
}

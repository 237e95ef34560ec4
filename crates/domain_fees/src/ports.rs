//! Fee Ledger Ports
//!
//! Port interfaces the fee ledger needs from its data source. The
//! application service only ever sees these traits:
//!
//! - **Postgres Adapter** (infra_db): SQL transactions with row locks
//! - **Mock Adapter**: in-memory, one write guard per unit of work
//!
//! # Units of work
//!
//! Two operations carry the ledger's concurrency guarantees and every
//! adapter must make each of them atomic:
//!
//! - [`FeeLedgerPort::insert_invoice_if_absent`] is a conditional insert on
//!   `(enrollment_id, month, year)`. Concurrent callers never duplicate.
//! - [`FeeLedgerPort::settle`] locks the student's open invoices, plans the
//!   distribution, checks the overpayment policy, then writes the receipt,
//!   the invoice updates and the allocation trail together, or nothing.
//!
//! ```rust,ignore
//! let settlement = ledger
//!     .settle(student_id, payment.amount, Some(&payment), OverpaymentPolicy::Accept, None)
//!     .await?;
//! assert_eq!(settlement.plan.total_applied() + settlement.plan.remainder, payment.amount);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{
    DomainPort, EnrollmentId, FeeStructureId, HealthCheckable, Money, OperationMetadata,
    PortError, StudentId,
};

use crate::config::OverpaymentPolicy;
use crate::distribution::DistributionPlan;
use crate::enrollment::{EnrolledCharge, Enrollment, EnrollmentStatus};
use crate::fee_structure::FeeStructure;
use crate::invoice::Invoice;
use crate::payment::{Payment, PaymentAllocation, PaymentWithAllocations};

/// A student as seen by the fee ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    /// Open set of states; only "active" students may be billed
    pub status: String,
}

impl Student {
    pub fn new(id: StudentId, name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: status.into(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("active")
    }
}

/// The committed result of a settle unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub plan: DistributionPlan,
    /// Empty when no receipt was recorded
    pub allocations: Vec<PaymentAllocation>,
}

/// Read access to the academy's student records
#[async_trait]
pub trait StudentDirectory: DomainPort + HealthCheckable {
    /// Fetches a student
    ///
    /// # Errors
    ///
    /// `PortError::NotFound` when no student has this id
    async fn get_student(&self, id: StudentId) -> Result<Student, PortError>;
}

/// Storage for fee structures, enrollments, invoices and payments
#[async_trait]
pub trait FeeLedgerPort: DomainPort + HealthCheckable {
    // ========================================================================
    // Fee Structure Catalog
    // ========================================================================

    /// Lists fee structures ordered by name
    async fn list_fee_structures(&self) -> Result<Vec<FeeStructure>, PortError>;

    async fn get_fee_structure(&self, id: FeeStructureId) -> Result<FeeStructure, PortError>;

    /// Inserts a fee structure
    ///
    /// # Errors
    ///
    /// `PortError::Conflict` when the name is taken, ignoring case
    async fn insert_fee_structure(
        &self,
        fee_structure: &FeeStructure,
        metadata: Option<OperationMetadata>,
    ) -> Result<(), PortError>;

    /// Changes the amount used for future invoices
    async fn update_fee_structure_amount(
        &self,
        id: FeeStructureId,
        amount: Money,
        metadata: Option<OperationMetadata>,
    ) -> Result<FeeStructure, PortError>;

    // ========================================================================
    // Enrollment Ledger
    // ========================================================================

    /// Inserts an enrollment
    ///
    /// # Errors
    ///
    /// `PortError::NotFound` when the fee structure does not exist
    async fn insert_enrollment(
        &self,
        enrollment: &Enrollment,
        metadata: Option<OperationMetadata>,
    ) -> Result<(), PortError>;

    async fn set_enrollment_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
        metadata: Option<OperationMetadata>,
    ) -> Result<Enrollment, PortError>;

    /// Active enrollments of a student joined with their fee structures
    async fn active_charges(&self, student_id: StudentId) -> Result<Vec<EnrolledCharge>, PortError>;

    // ========================================================================
    // Invoices & Payments
    // ========================================================================

    /// Inserts the invoice unless one exists for its enrollment and period
    ///
    /// Returns `true` when this call created the invoice.
    async fn insert_invoice_if_absent(&self, invoice: &Invoice) -> Result<bool, PortError>;

    /// All invoices of a student, oldest period first
    async fn list_invoices(&self, student_id: StudentId) -> Result<Vec<Invoice>, PortError>;

    /// Distributes `amount` across the student's open invoices atomically
    ///
    /// When `receipt` is given the payment row and one allocation per
    /// applied invoice are written in the same unit of work.
    ///
    /// # Errors
    ///
    /// - `PortError::Validation` when `policy` refuses the plan
    /// - `PortError::Conflict` when an invoice changed underneath the lock
    async fn settle(
        &self,
        student_id: StudentId,
        amount: Money,
        receipt: Option<&Payment>,
        policy: OverpaymentPolicy,
        metadata: Option<OperationMetadata>,
    ) -> Result<Settlement, PortError>;

    /// Payments of a student, newest first, with their allocations
    async fn list_payments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<PaymentWithAllocations>, PortError>;
}

/// In-memory adapters for testing
///
/// Each unit of work holds a single write guard on the whole ledger, which
/// gives the same all-or-nothing behaviour as the database transactions.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    use core_kernel::{AdapterHealth, BillingPeriod, HealthCheckResult, InvoiceId};
    use crate::distribution::plan_distribution;
    use crate::invoice::settlement_order;

    fn healthy(adapter_id: &str) -> HealthCheckResult {
        HealthCheckResult {
            adapter_id: adapter_id.to_string(),
            status: AdapterHealth::Healthy,
            latency_ms: 0,
            message: Some("Mock adapter always healthy".to_string()),
            checked_at: Utc::now(),
        }
    }

    #[derive(Debug, Default)]
    struct LedgerState {
        fee_structures: HashMap<FeeStructureId, FeeStructure>,
        enrollments: HashMap<EnrollmentId, Enrollment>,
        invoices: HashMap<InvoiceId, Invoice>,
        invoice_keys: HashMap<(EnrollmentId, BillingPeriod), InvoiceId>,
        payments: Vec<Payment>,
        allocations: Vec<PaymentAllocation>,
        failing_enrollments: HashSet<EnrollmentId>,
    }

    /// In-memory implementation of FeeLedgerPort
    #[derive(Debug, Default, Clone)]
    pub struct MockFeeLedger {
        state: Arc<RwLock<LedgerState>>,
    }

    impl MockFeeLedger {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every invoice insert for `enrollment_id` fail with a connection error
        pub async fn fail_invoice_inserts_for(&self, enrollment_id: EnrollmentId) {
            self.state.write().await.failing_enrollments.insert(enrollment_id);
        }

        pub async fn clear_failures(&self) {
            self.state.write().await.failing_enrollments.clear();
        }

        /// Overwrites a stored invoice, bypassing every ledger rule
        pub async fn put_invoice_unchecked(&self, invoice: Invoice) {
            let mut state = self.state.write().await;
            state
                .invoice_keys
                .insert((invoice.enrollment_id, invoice.period), invoice.id);
            state.invoices.insert(invoice.id, invoice);
        }

        pub async fn invoice_count(&self) -> usize {
            self.state.read().await.invoices.len()
        }

        pub async fn payment_count(&self) -> usize {
            self.state.read().await.payments.len()
        }

        pub async fn allocation_count(&self) -> usize {
            self.state.read().await.allocations.len()
        }
    }

    impl DomainPort for MockFeeLedger {}

    #[async_trait]
    impl HealthCheckable for MockFeeLedger {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("mock-fee-ledger")
        }
    }

    #[async_trait]
    impl FeeLedgerPort for MockFeeLedger {
        async fn list_fee_structures(&self) -> Result<Vec<FeeStructure>, PortError> {
            let state = self.state.read().await;
            let mut fees: Vec<FeeStructure> = state.fee_structures.values().cloned().collect();
            fees.sort_by(|a, b| a.name_key().cmp(&b.name_key()));
            Ok(fees)
        }

        async fn get_fee_structure(&self, id: FeeStructureId) -> Result<FeeStructure, PortError> {
            self.state
                .read()
                .await
                .fee_structures
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("FeeStructure", id))
        }

        async fn insert_fee_structure(
            &self,
            fee_structure: &FeeStructure,
            _metadata: Option<OperationMetadata>,
        ) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            let key = fee_structure.name_key();
            if state.fee_structures.values().any(|f| f.name_key() == key) {
                return Err(PortError::conflict(format!(
                    "Fee structure '{}' already exists",
                    fee_structure.name
                )));
            }
            state
                .fee_structures
                .insert(fee_structure.id, fee_structure.clone());
            Ok(())
        }

        async fn update_fee_structure_amount(
            &self,
            id: FeeStructureId,
            amount: Money,
            _metadata: Option<OperationMetadata>,
        ) -> Result<FeeStructure, PortError> {
            let mut state = self.state.write().await;
            let fee = state
                .fee_structures
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("FeeStructure", id))?;
            fee.amount = amount;
            fee.updated_at = Utc::now();
            Ok(fee.clone())
        }

        async fn insert_enrollment(
            &self,
            enrollment: &Enrollment,
            _metadata: Option<OperationMetadata>,
        ) -> Result<(), PortError> {
            let mut state = self.state.write().await;
            if !state.fee_structures.contains_key(&enrollment.fee_structure_id) {
                return Err(PortError::not_found(
                    "FeeStructure",
                    enrollment.fee_structure_id,
                ));
            }
            state.enrollments.insert(enrollment.id, enrollment.clone());
            Ok(())
        }

        async fn set_enrollment_status(
            &self,
            id: EnrollmentId,
            status: EnrollmentStatus,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Enrollment, PortError> {
            let mut state = self.state.write().await;
            let enrollment = state
                .enrollments
                .get_mut(&id)
                .ok_or_else(|| PortError::not_found("Enrollment", id))?;
            enrollment.status = status;
            Ok(enrollment.clone())
        }

        async fn active_charges(&self, student_id: StudentId) -> Result<Vec<EnrolledCharge>, PortError> {
            let state = self.state.read().await;
            let mut charges = state
                .enrollments
                .values()
                .filter(|e| e.student_id == student_id && e.is_active())
                .map(|e| {
                    state
                        .fee_structures
                        .get(&e.fee_structure_id)
                        .cloned()
                        .map(|fee_structure| EnrolledCharge {
                            enrollment: e.clone(),
                            fee_structure,
                        })
                        .ok_or_else(|| PortError::not_found("FeeStructure", e.fee_structure_id))
                })
                .collect::<Result<Vec<_>, _>>()?;
            charges.sort_by(|a, b| {
                a.enrollment
                    .start_date
                    .cmp(&b.enrollment.start_date)
                    .then(a.enrollment.id.cmp(&b.enrollment.id))
            });
            Ok(charges)
        }

        async fn insert_invoice_if_absent(&self, invoice: &Invoice) -> Result<bool, PortError> {
            let mut state = self.state.write().await;
            if state.failing_enrollments.contains(&invoice.enrollment_id) {
                return Err(PortError::connection(format!(
                    "injected failure for enrollment {}",
                    invoice.enrollment_id
                )));
            }
            let key = (invoice.enrollment_id, invoice.period);
            if state.invoice_keys.contains_key(&key) {
                return Ok(false);
            }
            state.invoice_keys.insert(key, invoice.id);
            state.invoices.insert(invoice.id, invoice.clone());
            Ok(true)
        }

        async fn list_invoices(&self, student_id: StudentId) -> Result<Vec<Invoice>, PortError> {
            let state = self.state.read().await;
            let mut invoices: Vec<Invoice> = state
                .invoices
                .values()
                .filter(|i| i.student_id == student_id)
                .cloned()
                .collect();
            invoices.sort_by(settlement_order);
            Ok(invoices)
        }

        async fn settle(
            &self,
            student_id: StudentId,
            amount: Money,
            receipt: Option<&Payment>,
            policy: OverpaymentPolicy,
            _metadata: Option<OperationMetadata>,
        ) -> Result<Settlement, PortError> {
            let mut state = self.state.write().await;

            let open: Vec<Invoice> = state
                .invoices
                .values()
                .filter(|i| i.student_id == student_id && i.status.is_open())
                .cloned()
                .collect();
            let plan = plan_distribution(&open, amount);
            policy.check(&plan)?;

            // all applications succeed before any invoice is replaced
            let mut settled = Vec::with_capacity(plan.applications.len());
            for application in &plan.applications {
                let mut invoice = state
                    .invoices
                    .get(&application.invoice_id)
                    .cloned()
                    .ok_or_else(|| PortError::not_found("Invoice", application.invoice_id))?;
                invoice
                    .apply(application.applied)
                    .map_err(|e| PortError::internal(e.to_string()))?;
                settled.push(invoice);
            }
            for invoice in settled {
                state.invoices.insert(invoice.id, invoice);
            }

            let now = Utc::now();

            let allocations = match receipt {
                Some(payment) => {
                    let allocations = plan.allocations(payment.id, now);
                    state.payments.push(payment.clone());
                    state.allocations.extend(allocations.iter().cloned());
                    allocations
                }
                None => Vec::new(),
            };

            Ok(Settlement { plan, allocations })
        }

        async fn list_payments(
            &self,
            student_id: StudentId,
        ) -> Result<Vec<PaymentWithAllocations>, PortError> {
            let state = self.state.read().await;
            let mut payments: Vec<PaymentWithAllocations> = state
                .payments
                .iter()
                .filter(|p| p.student_id == student_id)
                .map(|p| PaymentWithAllocations {
                    payment: p.clone(),
                    allocations: state
                        .allocations
                        .iter()
                        .filter(|a| a.payment_id == p.id)
                        .cloned()
                        .collect(),
                })
                .collect();
            payments.sort_by(|a, b| {
                b.payment
                    .payment_date
                    .cmp(&a.payment.payment_date)
                    .then(b.payment.id.cmp(&a.payment.id))
            });
            Ok(payments)
        }
    }

    /// In-memory implementation of StudentDirectory
    #[derive(Debug, Default, Clone)]
    pub struct MockStudentDirectory {
        students: Arc<RwLock<HashMap<StudentId, Student>>>,
    }

    impl MockStudentDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn add_student(&self, student: Student) {
            self.students.write().await.insert(student.id, student);
        }
    }

    impl DomainPort for MockStudentDirectory {}

    #[async_trait]
    impl HealthCheckable for MockStudentDirectory {
        async fn health_check(&self) -> HealthCheckResult {
            healthy("mock-student-directory")
        }
    }

    #[async_trait]
    impl StudentDirectory for MockStudentDirectory {
        async fn get_student(&self, id: StudentId) -> Result<Student, PortError> {
            self.students
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Student", id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockFeeLedger;
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::BillingPeriod;
    use rust_decimal_macros::dec;

    #[test]
    fn test_student_is_active_ignores_case() {
        let id = StudentId::new();
        assert!(Student::new(id, "Asha", "ACTIVE").is_active());
        assert!(!Student::new(id, "Asha", "graduated").is_active());
    }

    #[tokio::test]
    async fn test_mock_conditional_insert() {
        let ledger = MockFeeLedger::new();
        let fee = FeeStructure::new("Tennis", dec!(900), None).unwrap();
        ledger.insert_fee_structure(&fee, None).await.unwrap();
        let enrollment = Enrollment::new(
            StudentId::new(),
            fee.id,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        ledger.insert_enrollment(&enrollment, None).await.unwrap();
        let charge = EnrolledCharge { enrollment, fee_structure: fee };
        let period = BillingPeriod::new(5, 2024).unwrap();

        let first = Invoice::generate(&charge, period, 5).unwrap();
        let second = Invoice::generate(&charge, period, 5).unwrap();
        assert!(ledger.insert_invoice_if_absent(&first).await.unwrap());
        assert!(!ledger.insert_invoice_if_absent(&second).await.unwrap());
        assert_eq!(ledger.invoice_count().await, 1);
    }

    #[tokio::test]
    async fn test_mock_rejects_duplicate_name_ignoring_case() {
        let ledger = MockFeeLedger::new();
        let first = FeeStructure::new("Yoga", dec!(500), None).unwrap();
        let second = FeeStructure::new("YOGA", dec!(600), None).unwrap();
        ledger.insert_fee_structure(&first, None).await.unwrap();

        let err = ledger.insert_fee_structure(&second, None).await.unwrap_err();
        assert!(err.is_conflict());
    }
}

//! Fee ledger application service
//!
//! Orchestrates the generator, the distributor and the calculation view over
//! the ledger and student directory ports. The service holds no state of its
//! own; every guarantee about concurrent callers comes from the port's units
//! of work.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{
    BillingPeriod, EnrollmentId, FeeStructureId, Money, OperationMetadata, PortError, StudentId,
};

use crate::calculation::FeeCalculation;
use crate::config::{BillingConfig, OverpaymentPolicy};
use crate::distribution::{outstanding_balance, DistributionPlan};
use crate::enrollment::{Enrollment, EnrollmentStatus};
use crate::error::FeeError;
use crate::fee_structure::FeeStructure;
use crate::generator::{draft_invoices, GenerationReport};
use crate::invoice::Invoice;
use crate::payment::{CollectPaymentRequest, CollectionReceipt, Payment, PaymentWithAllocations};
use crate::ports::{FeeLedgerPort, Student, StudentDirectory};

/// Input for creating a fee structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeeStructure {
    pub name: String,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Input for enrolling a student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub student_id: StudentId,
    pub fee_structure_id: FeeStructureId,
    /// Defaults to today in the academy timezone
    pub start_date: Option<NaiveDate>,
}

/// Application service for the fee ledger
#[derive(Clone)]
pub struct FeeLedgerService {
    ledger: Arc<dyn FeeLedgerPort>,
    students: Arc<dyn StudentDirectory>,
    config: BillingConfig,
}

impl FeeLedgerService {
    pub fn new(
        ledger: Arc<dyn FeeLedgerPort>,
        students: Arc<dyn StudentDirectory>,
        config: BillingConfig,
    ) -> Self {
        Self {
            ledger,
            students,
            config,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<dyn FeeLedgerPort> {
        &self.ledger
    }

    pub fn students(&self) -> &Arc<dyn StudentDirectory> {
        &self.students
    }

    /// Today's date in the academy timezone
    pub fn today(&self) -> NaiveDate {
        self.config.timezone.today()
    }

    // ========================================================================
    // Invoice Generator
    // ========================================================================

    /// Creates the missing invoices of a student for the period containing
    /// `reference_date` (today when `None`)
    ///
    /// Safe to call any number of times. A failure for one enrollment is
    /// logged and reported without stopping the others; the next call fills
    /// the gap.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn ensure_generated_invoices(
        &self,
        student_id: StudentId,
        reference_date: Option<NaiveDate>,
    ) -> Result<GenerationReport, FeeError> {
        let reference_date = reference_date.unwrap_or_else(|| self.today());
        let period = BillingPeriod::containing(reference_date);
        let charges = self.ledger.active_charges(student_id).await?;

        let mut report = GenerationReport::new(period);
        for (enrollment_id, draft) in draft_invoices(&charges, period, self.config.due_day) {
            let invoice = match draft {
                Ok(invoice) => invoice,
                Err(e) => {
                    warn!(enrollment_id = %enrollment_id, error = %e, "Could not draft invoice");
                    report.record_failure(enrollment_id, e);
                    continue;
                }
            };

            match self.ledger.insert_invoice_if_absent(&invoice).await {
                Ok(true) => {
                    debug!(invoice_id = %invoice.id, enrollment_id = %enrollment_id, %period, "Invoice created");
                    report.created.push(invoice.id);
                }
                Ok(false) => report.existing.push(enrollment_id),
                Err(e) => {
                    warn!(enrollment_id = %enrollment_id, %period, error = %e, "Invoice generation failed");
                    report.record_failure(enrollment_id, e);
                }
            }
        }

        if !report.created.is_empty() {
            info!(
                %period,
                created = report.created.len(),
                existing = report.existing.len(),
                failed = report.failed.len(),
                "Generated invoices"
            );
        }
        Ok(report)
    }

    /// Generates invoices for a known student
    ///
    /// # Arguments
    ///
    /// * `student_id` - Student whose active enrollments are billed
    /// * `reference_date` - Any date in the period to bill; today when `None`
    ///
    /// # Errors
    ///
    /// `FeeError::UnknownStudent` before any invoice is written
    pub async fn generate_invoices(
        &self,
        student_id: StudentId,
        reference_date: Option<NaiveDate>,
    ) -> Result<GenerationReport, FeeError> {
        self.require_student(student_id).await?;
        self.ensure_generated_invoices(student_id, reference_date).await
    }

    // ========================================================================
    // Payment Distributor
    // ========================================================================

    /// Applies `amount` to the student's open invoices, oldest period first
    ///
    /// No receipt is recorded; the unapplied remainder is returned in the
    /// plan. Collection of real money goes through [`Self::collect_payment`].
    ///
    /// # Errors
    ///
    /// `FeeError::Money` when `amount` is not positive, has more than two
    /// decimal places or exceeds [`core_kernel::MAX_AMOUNT`]
    #[instrument(skip(self), fields(student_id = %student_id, amount = %amount))]
    pub async fn distribute(
        &self,
        student_id: StudentId,
        amount: Decimal,
    ) -> Result<DistributionPlan, FeeError> {
        let amount = Money::positive(amount)?;
        let settlement = self
            .ledger
            .settle(student_id, amount, None, OverpaymentPolicy::Accept, None)
            .await?;
        Ok(settlement.plan)
    }

    // ========================================================================
    // Fee Calculation View
    // ========================================================================

    /// Fee calculation as of today in the academy timezone
    pub async fn calculate(&self, student_id: StudentId) -> Result<FeeCalculation, FeeError> {
        self.calculate_as_of(student_id, self.today()).await
    }

    /// Runs the generator for the period of `today`, then aggregates
    ///
    /// # Errors
    ///
    /// `FeeError::Money` if stored totals leave the decimal range
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn calculate_as_of(
        &self,
        student_id: StudentId,
        today: NaiveDate,
    ) -> Result<FeeCalculation, FeeError> {
        self.require_student(student_id).await?;
        self.ensure_generated_invoices(student_id, Some(today)).await?;

        let charges = self.ledger.active_charges(student_id).await?;
        let invoices = self.ledger.list_invoices(student_id).await?;
        Ok(FeeCalculation::compute(&charges, &invoices, today)?)
    }

    // ========================================================================
    // Collection Action
    // ========================================================================

    /// Records a payment and distributes it across open invoices
    ///
    /// Input is validated before anything is written. The receipt, the
    /// invoice updates and the allocation trail commit together.
    ///
    /// # Errors
    ///
    /// - `FeeError::Money` / `FeeError::Validation` for bad amount or method
    /// - `FeeError::UnknownStudent` / `FeeError::InactiveStudent`
    /// - `FeeError::Overpayment` when the reject policy refuses a remainder
    #[instrument(skip(self, request, metadata), fields(student_id = %request.student_id, amount = %request.amount))]
    pub async fn collect_payment(
        &self,
        request: CollectPaymentRequest,
        metadata: Option<OperationMetadata>,
    ) -> Result<CollectionReceipt, FeeError> {
        let payment = Payment::new(
            request.student_id,
            request.amount,
            &request.payment_method,
            request.notes,
        )?;
        self.require_active_student(request.student_id).await?;

        let report = self
            .ensure_generated_invoices(request.student_id, None)
            .await?;
        if !report.is_complete() {
            warn!(failed = report.failed.len(), "Collecting with incomplete invoice generation");
        }

        let policy = self.config.overpayment_policy;
        let settlement = match self
            .ledger
            .settle(request.student_id, payment.amount, Some(&payment), policy, metadata.clone())
            .await
        {
            Ok(settlement) => settlement,
            Err(PortError::Validation { field: Some(field), .. })
                if field == "amount" && policy == OverpaymentPolicy::Reject =>
            {
                let invoices = self.ledger.list_invoices(request.student_id).await?;
                return Err(FeeError::Overpayment {
                    amount: payment.amount.amount(),
                    outstanding: outstanding_balance(&invoices)?.amount(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let amount_applied = settlement.plan.total_applied();
        let remainder = settlement.plan.remainder;
        if remainder.is_positive() {
            warn!(payment_id = %payment.id, %remainder, "Payment exceeds outstanding balance");
        }
        info!(
            payment_id = %payment.id,
            %amount_applied,
            invoices = settlement.allocations.len(),
            actor = metadata.as_ref().map(|m| m.actor()).unwrap_or("system"),
            "Payment collected"
        );

        Ok(CollectionReceipt {
            payment_id: payment.id,
            amount_applied,
            remainder,
            allocations: settlement.allocations,
        })
    }

    // ========================================================================
    // Catalog & Enrollment Administration
    // ========================================================================

    /// Lists the catalog
    ///
    /// # Returns
    ///
    /// Every fee structure ordered by name
    pub async fn list_fee_structures(&self) -> Result<Vec<FeeStructure>, FeeError> {
        Ok(self.ledger.list_fee_structures().await?)
    }

    /// Retrieves a fee structure by ID
    ///
    /// # Arguments
    ///
    /// * `id` - The fee structure ID
    ///
    /// # Errors
    ///
    /// Returns `FeeError::FeeStructureNotFound` if no such fee structure exists
    pub async fn get_fee_structure(&self, id: FeeStructureId) -> Result<FeeStructure, FeeError> {
        self.ledger
            .get_fee_structure(id)
            .await
            .map_err(|e| not_found_as(e, || FeeError::FeeStructureNotFound(id.to_string())))
    }

    /// Adds a fee structure to the catalog
    ///
    /// # Arguments
    ///
    /// * `input` - Name, monthly amount and optional description
    /// * `metadata` - Actor and correlation ID for the audit log
    ///
    /// # Errors
    ///
    /// - `FeeError::Validation` / `FeeError::Money` for a blank name or a bad amount
    /// - `FeeError::DuplicateFeeStructure` when the name is taken, ignoring case
    #[instrument(skip(self, input, metadata), fields(name = %input.name))]
    pub async fn create_fee_structure(
        &self,
        input: NewFeeStructure,
        metadata: Option<OperationMetadata>,
    ) -> Result<FeeStructure, FeeError> {
        let fee_structure = FeeStructure::new(input.name, input.amount, input.description)?;
        match self.ledger.insert_fee_structure(&fee_structure, metadata).await {
            Ok(()) => {
                info!(fee_structure_id = %fee_structure.id, amount = %fee_structure.amount, "Fee structure created");
                Ok(fee_structure)
            }
            Err(e) if e.is_conflict() => Err(FeeError::DuplicateFeeStructure(fee_structure.name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Changes the amount billed from the next generated invoice on
    ///
    /// # Errors
    ///
    /// `FeeError::Money` for a bad amount, `FeeError::FeeStructureNotFound`
    /// for an unknown ID
    #[instrument(skip(self, metadata), fields(fee_structure_id = %id))]
    pub async fn update_fee_structure_amount(
        &self,
        id: FeeStructureId,
        amount: Decimal,
        metadata: Option<OperationMetadata>,
    ) -> Result<FeeStructure, FeeError> {
        let amount = Money::positive(amount)?;
        let updated = self
            .ledger
            .update_fee_structure_amount(id, amount, metadata)
            .await
            .map_err(|e| not_found_as(e, || FeeError::FeeStructureNotFound(id.to_string())))?;
        info!(amount = %updated.amount, "Fee structure amount updated");
        Ok(updated)
    }

    /// Enrolls a student in a fee structure
    ///
    /// # Arguments
    ///
    /// * `input` - Student, fee structure and optional start date (today when absent)
    /// * `metadata` - Actor and correlation ID for the audit log
    ///
    /// # Errors
    ///
    /// - `FeeError::UnknownStudent` / `FeeError::InactiveStudent`
    /// - `FeeError::FeeStructureNotFound`
    #[instrument(skip(self, input, metadata), fields(student_id = %input.student_id, fee_structure_id = %input.fee_structure_id))]
    pub async fn create_enrollment(
        &self,
        input: NewEnrollment,
        metadata: Option<OperationMetadata>,
    ) -> Result<Enrollment, FeeError> {
        self.require_student(input.student_id).await?;
        let fee_structure = self.get_fee_structure(input.fee_structure_id).await?;

        let start_date = input.start_date.unwrap_or_else(|| self.today());
        let enrollment = Enrollment::new(input.student_id, fee_structure.id, start_date);
        self.ledger
            .insert_enrollment(&enrollment, metadata)
            .await
            .map_err(|e| {
                not_found_as(e, || FeeError::FeeStructureNotFound(fee_structure.id.to_string()))
            })?;

        info!(enrollment_id = %enrollment.id, "Enrollment created");
        Ok(enrollment)
    }

    /// Stops billing an enrollment; its invoices stay
    #[instrument(skip(self, metadata), fields(enrollment_id = %id))]
    pub async fn deactivate_enrollment(
        &self,
        id: EnrollmentId,
        metadata: Option<OperationMetadata>,
    ) -> Result<Enrollment, FeeError> {
        let enrollment = self
            .ledger
            .set_enrollment_status(id, EnrollmentStatus::Inactive, metadata)
            .await
            .map_err(|e| not_found_as(e, || FeeError::EnrollmentNotFound(id.to_string())))?;
        info!("Enrollment deactivated");
        Ok(enrollment)
    }

    // ========================================================================
    // Ledger Queries
    // ========================================================================

    /// Invoices of a student, oldest period first
    pub async fn list_invoices(&self, student_id: StudentId) -> Result<Vec<Invoice>, FeeError> {
        self.require_student(student_id).await?;
        Ok(self.ledger.list_invoices(student_id).await?)
    }

    /// Payments of a student, newest first
    pub async fn list_payments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<PaymentWithAllocations>, FeeError> {
        self.require_student(student_id).await?;
        Ok(self.ledger.list_payments(student_id).await?)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn require_student(&self, id: StudentId) -> Result<Student, FeeError> {
        self.students
            .get_student(id)
            .await
            .map_err(|e| not_found_as(e, || FeeError::UnknownStudent(id.to_string())))
    }

    async fn require_active_student(&self, id: StudentId) -> Result<Student, FeeError> {
        let student = self.require_student(id).await?;
        if !student.is_active() {
            return Err(FeeError::InactiveStudent(id.to_string()));
        }
        Ok(student)
    }
}

fn not_found_as(error: PortError, f: impl FnOnce() -> FeeError) -> FeeError {
    if error.is_not_found() {
        f()
    } else {
        FeeError::Port(error)
    }
}

//! PostgreSQL Fee Ledger Adapter
//!
//! This module provides the database adapter for the fee ledger, implementing
//! the `FeeLedgerPort` trait on top of `FeeRepository`.
//!
//! # Settlement
//!
//! `settle` runs as one transaction:
//!
//! 1. `SELECT ... FOR UPDATE` on the student's open invoices, oldest first
//! 2. plan the distribution and check the overpayment policy
//! 3. insert the payment row when a receipt is given
//! 4. guarded `UPDATE` per touched invoice (`WHERE paid_amount = previous`)
//! 5. insert one allocation per touched invoice
//!
//! Any failure rolls the whole transaction back when `tx` is dropped.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt::Display;
use sqlx::PgPool;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use core_kernel::{
    AllocationId, BillingPeriod, DomainPort, EnrollmentId, FeeStructureId, HealthCheckResult,
    HealthCheckable, InvoiceId, Money, OperationMetadata, PaymentId, PortError, StudentId,
};
use domain_fees::{
    plan_distribution, EnrolledCharge, Enrollment, EnrollmentStatus, FeeLedgerPort, FeeStructure,
    Invoice, InvoiceStatus, OverpaymentPolicy, Payment, PaymentAllocation, PaymentMethod,
    PaymentWithAllocations, Settlement,
};

use crate::error::DatabaseError;
use crate::repositories::fees::{
    AllocationRow, EnrollmentRow, FeeRepository, FeeStructureRow, InvoiceRow, PaymentRow,
};

/// PostgreSQL-backed implementation of the FeeLedgerPort trait
///
/// Database errors are translated to `PortError` variants:
/// - missing rows -> `PortError::NotFound` naming the entity
/// - unique and check violations, lost updates -> `PortError::Conflict`
/// - pool exhaustion -> `PortError::Timeout`
/// - everything else -> `PortError::Internal`
#[derive(Debug, Clone)]
pub struct PostgresFeeLedgerAdapter {
    repository: FeeRepository,
    pool: PgPool,
}

impl PostgresFeeLedgerAdapter {
    /// Creates a new PostgreSQL fee ledger adapter
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: FeeRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresFeeLedgerAdapter {}

#[async_trait]
impl HealthCheckable for PostgresFeeLedgerAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::check_pool(&self.pool, "postgres-fee-ledger").await
    }
}

#[async_trait]
impl FeeLedgerPort for PostgresFeeLedgerAdapter {
    #[instrument(skip(self))]
    async fn list_fee_structures(&self) -> Result<Vec<FeeStructure>, PortError> {
        let rows = self.repository.list_fee_structures().await?;
        Ok(rows.into_iter().map(row_to_fee_structure).collect())
    }

    #[instrument(skip(self), fields(fee_structure_id = %id))]
    async fn get_fee_structure(&self, id: FeeStructureId) -> Result<FeeStructure, PortError> {
        let row = self
            .repository
            .get_fee_structure(id.into())
            .await
            .map_err(not_found_as("FeeStructure", id))?;
        Ok(row_to_fee_structure(row))
    }

    #[instrument(skip(self, fee_structure, metadata), fields(name = %fee_structure.name))]
    async fn insert_fee_structure(
        &self,
        fee_structure: &FeeStructure,
        metadata: Option<OperationMetadata>,
    ) -> Result<(), PortError> {
        let row = FeeStructureRow {
            id: fee_structure.id.into(),
            name: fee_structure.name.clone(),
            amount: fee_structure.amount.amount(),
            description: fee_structure.description.clone(),
            created_at: fee_structure.created_at,
            updated_at: fee_structure.updated_at,
        };
        self.repository.insert_fee_structure(&row).await?;

        info!(actor = actor(&metadata), "Fee structure stored");
        Ok(())
    }

    #[instrument(skip(self, metadata), fields(fee_structure_id = %id))]
    async fn update_fee_structure_amount(
        &self,
        id: FeeStructureId,
        amount: Money,
        metadata: Option<OperationMetadata>,
    ) -> Result<FeeStructure, PortError> {
        let row = self
            .repository
            .update_fee_structure_amount(id.into(), amount.amount())
            .await
            .map_err(not_found_as("FeeStructure", id))?;

        info!(actor = actor(&metadata), %amount, "Fee structure amount changed");
        Ok(row_to_fee_structure(row))
    }

    #[instrument(skip(self, enrollment, metadata), fields(enrollment_id = %enrollment.id))]
    async fn insert_enrollment(
        &self,
        enrollment: &Enrollment,
        metadata: Option<OperationMetadata>,
    ) -> Result<(), PortError> {
        let row = EnrollmentRow {
            id: enrollment.id.into(),
            student_id: enrollment.student_id.into(),
            fee_structure_id: enrollment.fee_structure_id.into(),
            start_date: enrollment.start_date,
            status: enrollment.status.as_str().to_string(),
            created_at: enrollment.created_at,
        };
        self.repository
            .insert_enrollment(&row)
            .await
            .map_err(not_found_as("FeeStructure", enrollment.fee_structure_id))?;

        info!(actor = actor(&metadata), "Enrollment stored");
        Ok(())
    }

    #[instrument(skip(self, metadata), fields(enrollment_id = %id, status = %status))]
    async fn set_enrollment_status(
        &self,
        id: EnrollmentId,
        status: EnrollmentStatus,
        metadata: Option<OperationMetadata>,
    ) -> Result<Enrollment, PortError> {
        let row = self
            .repository
            .set_enrollment_status(id.into(), status.as_str())
            .await
            .map_err(not_found_as("Enrollment", id))?;

        info!(actor = actor(&metadata), "Enrollment status changed");
        row_to_enrollment(row)
    }

    #[instrument(skip(self), fields(student_id = %student_id))]
    async fn active_charges(&self, student_id: StudentId) -> Result<Vec<EnrolledCharge>, PortError> {
        let rows = self.repository.active_charges(student_id.into()).await?;
        debug!(count = rows.len(), "Loaded active charges");

        rows.into_iter()
            .map(|row| {
                let (enrollment, fee_structure) = row.into_parts();
                Ok(EnrolledCharge {
                    enrollment: row_to_enrollment(enrollment)?,
                    fee_structure: row_to_fee_structure(fee_structure),
                })
            })
            .collect()
    }

    #[instrument(skip(self, invoice), fields(enrollment_id = %invoice.enrollment_id, period = %invoice.period))]
    async fn insert_invoice_if_absent(&self, invoice: &Invoice) -> Result<bool, PortError> {
        let row = invoice_to_row(invoice);
        let created = self.repository.insert_invoice_if_absent(&row).await?;
        debug!(created, "Invoice insert attempted");
        Ok(created)
    }

    #[instrument(skip(self), fields(student_id = %student_id))]
    async fn list_invoices(&self, student_id: StudentId) -> Result<Vec<Invoice>, PortError> {
        let rows = self.repository.list_invoices(student_id.into()).await?;
        rows.into_iter().map(row_to_invoice).collect()
    }

    #[instrument(skip(self, receipt, metadata), fields(student_id = %student_id, amount = %amount))]
    async fn settle(
        &self,
        student_id: StudentId,
        amount: Money,
        receipt: Option<&Payment>,
        policy: OverpaymentPolicy,
        metadata: Option<OperationMetadata>,
    ) -> Result<Settlement, PortError> {
        let mut tx = self.repository.begin().await?;

        let locked = FeeRepository::lock_open_invoices_in(&mut *tx, student_id.into()).await?;
        let open = locked
            .into_iter()
            .map(row_to_invoice)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(open = open.len(), "Locked open invoices");

        let plan = plan_distribution(&open, amount);
        policy.check(&plan)?;

        if let Some(payment) = receipt {
            FeeRepository::insert_payment_in(&mut *tx, &payment_to_row(payment)).await?;
        }

        for application in &plan.applications {
            FeeRepository::apply_payment_in(
                &mut *tx,
                application.invoice_id.into(),
                application.previous_paid.amount(),
                application.new_paid.amount(),
                application.new_status.as_str(),
            )
            .await?;
        }

        let allocations = match receipt {
            Some(payment) => {
                let allocations = plan.allocations(payment.id, Utc::now());
                for allocation in &allocations {
                    FeeRepository::insert_allocation_in(&mut *tx, &allocation_to_row(allocation))
                        .await?;
                }
                allocations
            }
            None => Vec::new(),
        };

        tx.commit().await.map_err(DatabaseError::from)?;

        info!(
            actor = actor(&metadata),
            correlation_id = metadata.as_ref().and_then(|m| m.correlation_id.as_deref()),
            applied = %plan.total_applied(),
            remainder = %plan.remainder,
            invoices = plan.applications.len(),
            "Settlement committed"
        );
        Ok(Settlement { plan, allocations })
    }

    #[instrument(skip(self), fields(student_id = %student_id))]
    async fn list_payments(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<PaymentWithAllocations>, PortError> {
        let payments = self.repository.list_payments(student_id.into()).await?;
        let ids: Vec<Uuid> = payments.iter().map(|p| p.id).collect();

        let mut by_payment: HashMap<Uuid, Vec<PaymentAllocation>> = HashMap::new();
        for row in self.repository.allocations_for(&ids).await? {
            by_payment
                .entry(row.payment_id)
                .or_default()
                .push(row_to_allocation(row));
        }

        payments
            .into_iter()
            .map(|row| {
                let allocations = by_payment.remove(&row.id).unwrap_or_default();
                Ok(PaymentWithAllocations {
                    payment: row_to_payment(row)?,
                    allocations,
                })
            })
            .collect()
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn actor(metadata: &Option<OperationMetadata>) -> &str {
    metadata.as_ref().map(|m| m.actor()).unwrap_or("system")
}

/// Names the entity when a lookup by ID finds nothing
fn not_found_as(
    entity: &'static str,
    id: impl Display,
) -> impl FnOnce(DatabaseError) -> PortError {
    move |error| match error {
        DatabaseError::NotFound(_) => PortError::not_found(entity, id),
        other => other.into(),
    }
}

fn corrupt(entity: &str, id: Uuid, reason: impl Display) -> PortError {
    PortError::internal(format!("stored {} {} is invalid: {}", entity, id, reason))
}

fn row_to_fee_structure(row: FeeStructureRow) -> FeeStructure {
    FeeStructure {
        id: FeeStructureId::from(row.id),
        name: row.name,
        amount: Money::new(row.amount),
        description: row.description,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn row_to_enrollment(row: EnrollmentRow) -> Result<Enrollment, PortError> {
    let status: EnrollmentStatus = row
        .status
        .parse()
        .map_err(|e| corrupt("enrollment", row.id, e))?;

    Ok(Enrollment {
        id: EnrollmentId::from(row.id),
        student_id: StudentId::from(row.student_id),
        fee_structure_id: FeeStructureId::from(row.fee_structure_id),
        start_date: row.start_date,
        status,
        created_at: row.created_at,
    })
}

fn row_to_invoice(row: InvoiceRow) -> Result<Invoice, PortError> {
    let month = u32::try_from(row.month).map_err(|e| corrupt("invoice", row.id, e))?;
    let period = BillingPeriod::new(month, row.year).map_err(|e| corrupt("invoice", row.id, e))?;
    let status: InvoiceStatus = row
        .status
        .parse()
        .map_err(|e| corrupt("invoice", row.id, e))?;

    Ok(Invoice {
        id: InvoiceId::from(row.id),
        student_id: StudentId::from(row.student_id),
        enrollment_id: EnrollmentId::from(row.enrollment_id),
        period,
        amount: Money::new(row.amount),
        paid_amount: Money::new(row.paid_amount),
        status,
        due_date: row.due_date,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn invoice_to_row(invoice: &Invoice) -> InvoiceRow {
    InvoiceRow {
        id: invoice.id.into(),
        student_id: invoice.student_id.into(),
        enrollment_id: invoice.enrollment_id.into(),
        month: invoice.period.month() as i32,
        year: invoice.period.year(),
        amount: invoice.amount.amount(),
        paid_amount: invoice.paid_amount.amount(),
        status: invoice.status.as_str().to_string(),
        due_date: invoice.due_date,
        created_at: invoice.created_at,
        updated_at: invoice.updated_at,
    }
}

fn row_to_payment(row: PaymentRow) -> Result<Payment, PortError> {
    let payment_method =
        PaymentMethod::parse(&row.payment_method).map_err(|e| corrupt("payment", row.id, e))?;

    Ok(Payment {
        id: PaymentId::from(row.id),
        student_id: StudentId::from(row.student_id),
        amount: Money::new(row.amount),
        payment_date: row.payment_date,
        payment_method,
        notes: row.notes,
    })
}

fn payment_to_row(payment: &Payment) -> PaymentRow {
    PaymentRow {
        id: payment.id.into(),
        student_id: payment.student_id.into(),
        amount: payment.amount.amount(),
        payment_date: payment.payment_date,
        payment_method: payment.payment_method.as_str().to_string(),
        notes: payment.notes.clone(),
    }
}

fn row_to_allocation(row: AllocationRow) -> PaymentAllocation {
    PaymentAllocation {
        id: AllocationId::from(row.id),
        payment_id: PaymentId::from(row.payment_id),
        invoice_id: InvoiceId::from(row.invoice_id),
        applied_amount: Money::new(row.applied_amount),
        allocated_at: row.allocated_at,
    }
}

fn allocation_to_row(allocation: &PaymentAllocation) -> AllocationRow {
    AllocationRow {
        id: allocation.id.into(),
        payment_id: allocation.payment_id.into(),
        invoice_id: allocation.invoice_id.into(),
        applied_amount: allocation.applied_amount.amount(),
        allocated_at: allocation.allocated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn invoice_row(month: i32, status: &str) -> InvoiceRow {
        InvoiceRow {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            enrollment_id: Uuid::new_v4(),
            month,
            year: 2024,
            amount: dec!(500.00),
            paid_amount: dec!(200.00),
            status: status.to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_invoice_row_round_trip() {
        let row = invoice_row(3, "partial");
        let invoice = row_to_invoice(row.clone()).unwrap();

        assert_eq!(invoice.period, BillingPeriod::new(3, 2024).unwrap());
        assert_eq!(invoice.status, InvoiceStatus::Partial);
        assert_eq!(invoice.balance_due(), Money::new(dec!(300)));

        let back = invoice_to_row(&invoice);
        assert_eq!(back.id, row.id);
        assert_eq!(back.month, 3);
        assert_eq!(back.paid_amount, dec!(200.00));
    }

    #[test]
    fn test_unknown_invoice_status_is_internal_error() {
        let error = row_to_invoice(invoice_row(3, "refunded")).unwrap_err();
        assert!(matches!(error, PortError::Internal { .. }));
    }

    #[test]
    fn test_invalid_month_is_rejected() {
        assert!(row_to_invoice(invoice_row(13, "pending")).is_err());
        assert!(row_to_invoice(invoice_row(-1, "pending")).is_err());
    }

    #[test]
    fn test_not_found_names_entity() {
        let id = EnrollmentId::new();
        let error = not_found_as("Enrollment", id)(DatabaseError::not_found("Enrollment", id));
        match error {
            PortError::NotFound { entity_type, .. } => assert_eq!(entity_type, "Enrollment"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}

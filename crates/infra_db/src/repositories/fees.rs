//! Fee ledger repository implementation
//!
//! This module provides database access for fee structures, enrollments,
//! student fee invoices, payments and their allocations.
//!
//! Pool-level methods run one statement each. The `*_in` functions take an
//! open connection so the adapter can compose them inside a transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::Postgres;
use sqlx::{FromRow, PgConnection, PgPool, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

const FEE_STRUCTURE_COLUMNS: &str = "id, name, amount, description, created_at, updated_at";

const ENROLLMENT_COLUMNS: &str = "id, student_id, fee_structure_id, start_date, status, created_at";

const INVOICE_COLUMNS: &str = "id, student_id, enrollment_id, month, year, amount, paid_amount, \
                               status, due_date, created_at, updated_at";

/// Repository for the fee ledger tables
#[derive(Debug, Clone)]
pub struct FeeRepository {
    pool: PgPool,
}

impl FeeRepository {
    /// Creates a new FeeRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a transaction on the underlying pool
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, DatabaseError> {
        Ok(self.pool.begin().await?)
    }

    // ========================================================================
    // Fee Structures
    // ========================================================================

    /// Lists all fee structures ordered by name, ignoring case
    pub async fn list_fee_structures(&self) -> Result<Vec<FeeStructureRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeeStructureRow>(&format!(
            "SELECT {FEE_STRUCTURE_COLUMNS} FROM fee_structures ORDER BY lower(name), id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Retrieves a fee structure by ID
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if no fee structure has this ID
    pub async fn get_fee_structure(&self, id: Uuid) -> Result<FeeStructureRow, DatabaseError> {
        sqlx::query_as::<_, FeeStructureRow>(&format!(
            "SELECT {FEE_STRUCTURE_COLUMNS} FROM fee_structures WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("FeeStructure", id))
    }

    /// Inserts a fee structure
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::DuplicateEntry` if the name is already taken
    pub async fn insert_fee_structure(&self, row: &FeeStructureRow) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO fee_structures (id, name, amount, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(row.id)
        .bind(&row.name)
        .bind(row.amount)
        .bind(&row.description)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match DatabaseError::from(e) {
                DatabaseError::DuplicateEntry(_) => {
                    Err(DatabaseError::duplicate("Fee structure", "name", &row.name))
                }
                other => Err(other),
            },
        }
    }

    /// Changes the amount billed by future invoices
    pub async fn update_fee_structure_amount(
        &self,
        id: Uuid,
        amount: Decimal,
    ) -> Result<FeeStructureRow, DatabaseError> {
        sqlx::query_as::<_, FeeStructureRow>(&format!(
            "UPDATE fee_structures SET amount = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {FEE_STRUCTURE_COLUMNS}"
        ))
        .bind(id)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("FeeStructure", id))
    }

    // ========================================================================
    // Enrollments
    // ========================================================================

    /// Inserts an enrollment after confirming its fee structure exists
    ///
    /// The fee structure row is share-locked so it cannot disappear between
    /// the check and the insert.
    pub async fn insert_enrollment(&self, row: &EnrollmentRow) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM fee_structures WHERE id = $1 FOR SHARE",
        )
        .bind(row.fee_structure_id)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            return Err(DatabaseError::not_found("FeeStructure", row.fee_structure_id));
        }

        sqlx::query(
            r#"
            INSERT INTO enrollments (id, student_id, fee_structure_id, start_date, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(row.id)
        .bind(row.student_id)
        .bind(row.fee_structure_id)
        .bind(row.start_date)
        .bind(&row.status)
        .bind(row.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Sets the status of an enrollment and returns the updated row
    pub async fn set_enrollment_status(
        &self,
        id: Uuid,
        status: &str,
    ) -> Result<EnrollmentRow, DatabaseError> {
        sqlx::query_as::<_, EnrollmentRow>(&format!(
            "UPDATE enrollments SET status = $2 WHERE id = $1 RETURNING {ENROLLMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Enrollment", id))
    }

    /// Active enrollments of a student joined with their fee structures
    pub async fn active_charges(&self, student_id: Uuid) -> Result<Vec<ChargeRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, ChargeRow>(
            r#"
            SELECT
                e.id AS enrollment_id,
                e.student_id,
                e.start_date,
                e.status AS enrollment_status,
                e.created_at AS enrolled_at,
                f.id AS fee_structure_id,
                f.name AS fee_name,
                f.amount AS fee_amount,
                f.description AS fee_description,
                f.created_at AS fee_created_at,
                f.updated_at AS fee_updated_at
            FROM enrollments e
            JOIN fee_structures f ON f.id = e.fee_structure_id
            WHERE e.student_id = $1 AND e.status = 'active'
            ORDER BY e.start_date, e.id
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ========================================================================
    // Invoices
    // ========================================================================

    /// Inserts an invoice unless its enrollment already has one for the period
    ///
    /// Returns `true` when this call created the row.
    pub async fn insert_invoice_if_absent(&self, row: &InvoiceRow) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            INSERT INTO student_fees (
                id, student_id, enrollment_id, month, year, amount, paid_amount,
                status, due_date, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (enrollment_id, month, year) DO NOTHING
            "#,
        )
        .bind(row.id)
        .bind(row.student_id)
        .bind(row.enrollment_id)
        .bind(row.month)
        .bind(row.year)
        .bind(row.amount)
        .bind(row.paid_amount)
        .bind(&row.status)
        .bind(row.due_date)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// All invoices of a student, oldest period first
    pub async fn list_invoices(&self, student_id: Uuid) -> Result<Vec<InvoiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM student_fees WHERE student_id = $1 \
             ORDER BY year, month, due_date, id"
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Locks the open invoices of a student for the rest of the transaction
    ///
    /// Rows are locked in settlement order so concurrent settlements for the
    /// same student queue up instead of deadlocking.
    pub async fn lock_open_invoices_in(
        conn: &mut PgConnection,
        student_id: Uuid,
    ) -> Result<Vec<InvoiceRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM student_fees \
             WHERE student_id = $1 AND status <> 'paid' \
             ORDER BY year, month, due_date, id FOR UPDATE"
        ))
        .bind(student_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Moves an invoice from `previous_paid` to `new_paid`
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::TransactionFailed` if the stored paid amount is
    /// no longer `previous_paid`
    pub async fn apply_payment_in(
        conn: &mut PgConnection,
        invoice_id: Uuid,
        previous_paid: Decimal,
        new_paid: Decimal,
        status: &str,
    ) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE student_fees
            SET paid_amount = $3, status = $4, updated_at = NOW()
            WHERE id = $1 AND paid_amount = $2
            "#,
        )
        .bind(invoice_id)
        .bind(previous_paid)
        .bind(new_paid)
        .bind(status)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() != 1 {
            return Err(DatabaseError::TransactionFailed(format!(
                "invoice {} changed while it was being settled",
                invoice_id
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Payments
    // ========================================================================

    /// Records a received payment
    pub async fn insert_payment_in(
        conn: &mut PgConnection,
        row: &PaymentRow,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, student_id, amount, payment_date, payment_method, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(row.id)
        .bind(row.student_id)
        .bind(row.amount)
        .bind(row.payment_date)
        .bind(&row.payment_method)
        .bind(&row.notes)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Records how much of a payment went to one invoice
    pub async fn insert_allocation_in(
        conn: &mut PgConnection,
        row: &AllocationRow,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO payment_allocations (id, payment_id, invoice_id, applied_amount, allocated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(row.id)
        .bind(row.payment_id)
        .bind(row.invoice_id)
        .bind(row.applied_amount)
        .bind(row.allocated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Payments of a student, newest first
    pub async fn list_payments(&self, student_id: Uuid) -> Result<Vec<PaymentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, student_id, amount, payment_date, payment_method, notes
            FROM payments
            WHERE student_id = $1
            ORDER BY payment_date DESC, id DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Allocations belonging to any of the given payments
    pub async fn allocations_for(
        &self,
        payment_ids: &[Uuid],
    ) -> Result<Vec<AllocationRow>, DatabaseError> {
        if payment_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, AllocationRow>(
            r#"
            SELECT a.id, a.payment_id, a.invoice_id, a.applied_amount, a.allocated_at
            FROM payment_allocations a
            JOIN student_fees f ON f.id = a.invoice_id
            WHERE a.payment_id = ANY($1)
            ORDER BY f.year, f.month, f.due_date, f.id
            "#,
        )
        .bind(payment_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// ============================================================================
// Row Types
// ============================================================================

/// Database row for a fee structure
#[derive(Debug, Clone, FromRow)]
pub struct FeeStructureRow {
    pub id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for an enrollment
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub fee_structure_id: Uuid,
    pub start_date: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// An enrollment joined with its fee structure
#[derive(Debug, Clone, FromRow)]
pub struct ChargeRow {
    pub enrollment_id: Uuid,
    pub student_id: Uuid,
    pub start_date: NaiveDate,
    pub enrollment_status: String,
    pub enrolled_at: DateTime<Utc>,
    pub fee_structure_id: Uuid,
    pub fee_name: String,
    pub fee_amount: Decimal,
    pub fee_description: Option<String>,
    pub fee_created_at: DateTime<Utc>,
    pub fee_updated_at: DateTime<Utc>,
}

impl ChargeRow {
    /// Splits the joined row into its two halves
    pub fn into_parts(self) -> (EnrollmentRow, FeeStructureRow) {
        (
            EnrollmentRow {
                id: self.enrollment_id,
                student_id: self.student_id,
                fee_structure_id: self.fee_structure_id,
                start_date: self.start_date,
                status: self.enrollment_status,
                created_at: self.enrolled_at,
            },
            FeeStructureRow {
                id: self.fee_structure_id,
                name: self.fee_name,
                amount: self.fee_amount,
                description: self.fee_description,
                created_at: self.fee_created_at,
                updated_at: self.fee_updated_at,
            },
        )
    }
}

/// Database row for a student fee invoice
#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub enrollment_id: Uuid,
    pub month: i32,
    pub year: i32,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub status: String,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database row for a payment
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub payment_method: String,
    pub notes: Option<String>,
}

/// Database row for a payment allocation
#[derive(Debug, Clone, FromRow)]
pub struct AllocationRow {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub applied_amount: Decimal,
    pub allocated_at: DateTime<Utc>,
}

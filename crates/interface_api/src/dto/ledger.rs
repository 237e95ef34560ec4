//! Invoice, payment and fee calculation DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_fees::{
    ChargeBreakdown, CollectPaymentRequest, CollectionReceipt, FeeCalculation, GenerationReport,
    Invoice, PaymentAllocation, PaymentWithAllocations,
};

#[derive(Debug, Deserialize, Validate)]
pub struct CollectPaymentBody {
    pub student_id: Uuid,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 50, message = "must be 1 to 50 characters"))]
    pub payment_method: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<CollectPaymentBody> for CollectPaymentRequest {
    fn from(body: CollectPaymentBody) -> Self {
        CollectPaymentRequest {
            student_id: body.student_id.into(),
            amount: body.amount,
            payment_method: body.payment_method,
            notes: body.notes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AllocationResponse {
    pub invoice_id: Uuid,
    pub applied_amount: Decimal,
    pub allocated_at: DateTime<Utc>,
}

impl From<PaymentAllocation> for AllocationResponse {
    fn from(allocation: PaymentAllocation) -> Self {
        Self {
            invoice_id: allocation.invoice_id.into(),
            applied_amount: allocation.applied_amount.amount(),
            allocated_at: allocation.allocated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub payment_id: Uuid,
    pub amount_applied: Decimal,
    pub remainder: Decimal,
    pub allocations: Vec<AllocationResponse>,
}

impl From<CollectionReceipt> for CollectionResponse {
    fn from(receipt: CollectionReceipt) -> Self {
        Self {
            payment_id: receipt.payment_id.into(),
            amount_applied: receipt.amount_applied.amount(),
            remainder: receipt.remainder.amount(),
            allocations: receipt.allocations.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub amount: Decimal,
    pub payment_date: DateTime<Utc>,
    pub payment_method: String,
    pub notes: Option<String>,
    pub unallocated: Decimal,
    pub allocations: Vec<AllocationResponse>,
}

impl From<PaymentWithAllocations> for PaymentResponse {
    fn from(entry: PaymentWithAllocations) -> Self {
        let unallocated = entry.unallocated().amount();
        let payment = entry.payment;
        Self {
            id: payment.id.into(),
            amount: payment.amount.amount(),
            payment_date: payment.payment_date,
            payment_method: payment.payment_method.as_str().to_string(),
            notes: payment.notes,
            unallocated,
            allocations: entry.allocations.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub month: u32,
    pub year: i32,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub status: String,
    pub due_date: NaiveDate,
    pub overdue: bool,
}

impl InvoiceResponse {
    pub fn from_invoice(invoice: Invoice, today: NaiveDate) -> Self {
        Self {
            id: invoice.id.into(),
            enrollment_id: invoice.enrollment_id.into(),
            month: invoice.period.month(),
            year: invoice.period.year(),
            amount: invoice.amount.amount(),
            paid_amount: invoice.paid_amount.amount(),
            balance_due: invoice.balance_due().amount(),
            status: invoice.status.to_string(),
            due_date: invoice.due_date,
            overdue: invoice.is_overdue(today),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateInvoicesQuery {
    /// Bills the period containing this date instead of today's
    pub reference_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub month: u32,
    pub year: i32,
    pub created: Vec<Uuid>,
    pub existing: usize,
    pub failed: Vec<String>,
}

impl From<GenerationReport> for GenerationResponse {
    fn from(report: GenerationReport) -> Self {
        Self {
            month: report.period.month(),
            year: report.period.year(),
            created: report.created.into_iter().map(Into::into).collect(),
            existing: report.existing.len(),
            failed: report
                .failed
                .into_iter()
                .map(|f| format!("{}: {}", f.enrollment_id, f.reason))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChargeResponse {
    pub enrollment_id: Uuid,
    pub fee_structure_id: Uuid,
    pub fee_structure_name: String,
    pub monthly_amount: Decimal,
    pub pending_amount: Decimal,
}

impl From<ChargeBreakdown> for ChargeResponse {
    fn from(charge: ChargeBreakdown) -> Self {
        Self {
            enrollment_id: charge.enrollment_id.into(),
            fee_structure_id: charge.fee_structure_id.into(),
            fee_structure_name: charge.fee_structure_name,
            monthly_amount: charge.monthly_amount.amount(),
            pending_amount: charge.pending_amount.amount(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeeCalculationResponse {
    pub monthly_fee: Decimal,
    pub total_paid: Decimal,
    pub pending_amount: Decimal,
    pub overdue_amount: Decimal,
    pub suggested_amount: Decimal,
    pub per_charge: Vec<ChargeResponse>,
}

impl From<FeeCalculation> for FeeCalculationResponse {
    fn from(view: FeeCalculation) -> Self {
        Self {
            monthly_fee: view.monthly_fee.amount(),
            total_paid: view.total_paid.amount(),
            pending_amount: view.pending_amount.amount(),
            overdue_amount: view.overdue_amount.amount(),
            suggested_amount: view.suggested_amount.amount(),
            per_charge: view.per_charge.into_iter().map(Into::into).collect(),
        }
    }
}

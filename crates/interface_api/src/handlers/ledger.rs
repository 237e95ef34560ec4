//! Invoice, payment and fee calculation handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::permissions;
use crate::dto::ledger::*;
use crate::middleware::AuthUser;
use crate::{error::ApiError, AppState};

/// Fee calculation view for a student
///
/// Bills the current period first, so the view reflects this month.
pub async fn fee_calculation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<Uuid>,
) -> Result<Json<FeeCalculationResponse>, ApiError> {
    user.require(permissions::FEES_READ)?;

    let view = state.service.calculate(student_id.into()).await?;
    Ok(Json(view.into()))
}

/// Records a payment and settles it oldest invoice first
pub async fn collect_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CollectPaymentBody>,
) -> Result<Json<CollectionResponse>, ApiError> {
    user.require(permissions::PAYMENTS_COLLECT)?;
    body.validate()?;

    let receipt = state
        .service
        .collect_payment(body.into(), Some(user.metadata()))
        .await?;
    Ok(Json(receipt.into()))
}

/// Runs the invoice generator for a student
pub async fn generate_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<Uuid>,
    Query(query): Query<GenerateInvoicesQuery>,
) -> Result<Json<GenerationResponse>, ApiError> {
    user.require(permissions::FEES_GENERATE)?;

    let report = state
        .service
        .generate_invoices(student_id.into(), query.reference_date)
        .await?;
    Ok(Json(report.into()))
}

/// Lists a student's invoices, oldest first
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<InvoiceResponse>>, ApiError> {
    user.require(permissions::FEES_READ)?;

    let today = state.service.today();
    let invoices = state.service.list_invoices(student_id.into()).await?;
    Ok(Json(
        invoices
            .into_iter()
            .map(|invoice| InvoiceResponse::from_invoice(invoice, today))
            .collect(),
    ))
}

/// Lists a student's payments, newest first, with their allocations
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Vec<PaymentResponse>>, ApiError> {
    user.require(permissions::FEES_READ)?;

    let payments = state.service.list_payments(student_id.into()).await?;
    Ok(Json(payments.into_iter().map(Into::into).collect()))
}

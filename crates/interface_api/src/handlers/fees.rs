//! Fee structure and enrollment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::auth::permissions;
use crate::dto::fees::*;
use crate::middleware::AuthUser;
use crate::{error::ApiError, AppState};

/// Lists fee structures
pub async fn list_fee_structures(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<FeeStructureResponse>>, ApiError> {
    user.require(permissions::FEES_READ)?;

    let fees = state.service.list_fee_structures().await?;
    Ok(Json(fees.into_iter().map(Into::into).collect()))
}

/// Gets a fee structure by ID
pub async fn get_fee_structure(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FeeStructureResponse>, ApiError> {
    user.require(permissions::FEES_READ)?;

    let fee = state.service.get_fee_structure(id.into()).await?;
    Ok(Json(fee.into()))
}

/// Creates a fee structure
pub async fn create_fee_structure(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateFeeStructureRequest>,
) -> Result<(StatusCode, Json<FeeStructureResponse>), ApiError> {
    user.require(permissions::CATALOG_WRITE)?;
    request.validate()?;

    let fee = state
        .service
        .create_fee_structure(request.into(), Some(user.metadata()))
        .await?;
    Ok((StatusCode::CREATED, Json(fee.into())))
}

/// Changes the amount future invoices bill
pub async fn update_fee_structure_amount(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAmountRequest>,
) -> Result<Json<FeeStructureResponse>, ApiError> {
    user.require(permissions::CATALOG_WRITE)?;

    let fee = state
        .service
        .update_fee_structure_amount(id.into(), request.amount, Some(user.metadata()))
        .await?;
    Ok(Json(fee.into()))
}

/// Enrolls a student in a fee structure
pub async fn create_enrollment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateEnrollmentRequest>,
) -> Result<(StatusCode, Json<EnrollmentResponse>), ApiError> {
    user.require(permissions::CATALOG_WRITE)?;

    let enrollment = state
        .service
        .create_enrollment(request.into(), Some(user.metadata()))
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment.into())))
}

/// Deactivates an enrollment; its invoices remain
pub async fn deactivate_enrollment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    user.require(permissions::CATALOG_WRITE)?;

    let enrollment = state
        .service
        .deactivate_enrollment(id.into(), Some(user.metadata()))
        .await?;
    Ok(Json(enrollment.into()))
}

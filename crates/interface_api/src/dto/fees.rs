//! Fee structure and enrollment DTOs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_fees::{Enrollment, FeeStructure, NewEnrollment, NewFeeStructure};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeeStructureRequest {
    #[validate(length(min = 1, max = 120, message = "must be 1 to 120 characters"))]
    pub name: String,
    pub amount: Decimal,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

impl From<CreateFeeStructureRequest> for NewFeeStructure {
    fn from(request: CreateFeeStructureRequest) -> Self {
        NewFeeStructure {
            name: request.name,
            amount: request.amount,
            description: request.description,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAmountRequest {
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct FeeStructureResponse {
    pub id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FeeStructure> for FeeStructureResponse {
    fn from(fee: FeeStructure) -> Self {
        Self {
            id: fee.id.into(),
            name: fee.name,
            amount: fee.amount.amount(),
            description: fee.description,
            created_at: fee.created_at,
            updated_at: fee.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub student_id: Uuid,
    pub fee_structure_id: Uuid,
    /// Defaults to today in the academy timezone
    pub start_date: Option<NaiveDate>,
}

impl From<CreateEnrollmentRequest> for NewEnrollment {
    fn from(request: CreateEnrollmentRequest) -> Self {
        NewEnrollment {
            student_id: request.student_id.into(),
            fee_structure_id: request.fee_structure_id.into(),
            start_date: request.start_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub fee_structure_id: Uuid,
    pub start_date: NaiveDate,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(enrollment: Enrollment) -> Self {
        Self {
            id: enrollment.id.into(),
            student_id: enrollment.student_id.into(),
            fee_structure_id: enrollment.fee_structure_id.into(),
            start_date: enrollment.start_date,
            status: enrollment.status.to_string(),
            created_at: enrollment.created_at,
        }
    }
}

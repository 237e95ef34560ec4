//! Enrollment ledger
//!
//! An enrollment links a student to a fee structure. Only active enrollments
//! are billed. Enrollments are never deleted so historical invoices always
//! join back to them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{EnrollmentId, FeeStructureId, StudentId};
use crate::error::FeeError;
use crate::fee_structure::FeeStructure;

/// Enrollment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    /// Billed every month
    Active,
    /// Dropped; kept for history
    Inactive,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrollmentStatus {
    type Err = FeeError;

    /// Anything other than "active" counts as not billed
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(EnrollmentStatus::Active),
            "" => Err(FeeError::validation("Enrollment status is required")),
            _ => Ok(EnrollmentStatus::Inactive),
        }
    }
}

/// A student's enrollment in a recurring charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub fee_structure_id: FeeStructureId,
    pub start_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    /// Creates a new active enrollment
    pub fn new(student_id: StudentId, fee_structure_id: FeeStructureId, start_date: NaiveDate) -> Self {
        Self {
            id: EnrollmentId::new_v7(),
            student_id,
            fee_structure_id,
            start_date,
            status: EnrollmentStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EnrollmentStatus::Active
    }

    /// Marks the enrollment as dropped
    pub fn deactivate(&mut self) {
        self.status = EnrollmentStatus::Inactive;
    }
}

/// An active enrollment joined with its fee structure
///
/// This is the unit the generator bills and the calculation view sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledCharge {
    pub enrollment: Enrollment,
    pub fee_structure: FeeStructure,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_enrollment_is_active() {
        let enrollment = Enrollment::new(
            StudentId::new(),
            FeeStructureId::new(),
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        );
        assert!(enrollment.is_active());
    }

    #[test]
    fn test_deactivate() {
        let mut enrollment = Enrollment::new(
            StudentId::new(),
            FeeStructureId::new(),
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        );
        enrollment.deactivate();
        assert_eq!(enrollment.status, EnrollmentStatus::Inactive);
        assert!(!enrollment.is_active());
    }

    #[test]
    fn test_status_parsing_treats_unknown_as_inactive() {
        assert_eq!("ACTIVE".parse::<EnrollmentStatus>().unwrap(), EnrollmentStatus::Active);
        assert_eq!("dropped".parse::<EnrollmentStatus>().unwrap(), EnrollmentStatus::Inactive);
        assert!("".parse::<EnrollmentStatus>().is_err());
    }
}

//! Fee structure catalog
//!
//! A fee structure is a named recurring monthly charge, e.g. a program's
//! tuition. Only its amount may change once invoices reference it, and a
//! change affects future generation only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{FeeStructureId, Money};
use crate::error::FeeError;

/// A named recurring charge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeStructure {
    /// Unique identifier
    pub id: FeeStructureId,
    /// Display name, unique ignoring case
    pub name: String,
    /// Monthly charge
    pub amount: Money,
    /// Free-form description
    pub description: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl FeeStructure {
    /// Creates a fee structure after validating name and amount
    ///
    /// # Errors
    ///
    /// - `FeeError::Validation` if the name is blank
    /// - `FeeError::Money` if the amount is not positive
    pub fn new(
        name: impl Into<String>,
        amount: Decimal,
        description: Option<String>,
    ) -> Result<Self, FeeError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(FeeError::validation("Fee structure name is required"));
        }
        let amount = Money::positive(amount)?;
        let now = Utc::now();

        Ok(Self {
            id: FeeStructureId::new_v7(),
            name,
            amount,
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            created_at: now,
            updated_at: now,
        })
    }

    /// Key used for the case-insensitive uniqueness check
    pub fn name_key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Lowercased, trimmed form of a fee structure name
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

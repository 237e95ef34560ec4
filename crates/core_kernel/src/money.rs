//! Money type with precise decimal arithmetic
//!
//! The academy bills in a single currency, so `Money` is a thin wrapper over
//! `rust_decimal::Decimal` that pins every amount to the currency's minor
//! unit (two decimal places). Floating point never touches a balance.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use thiserror::Error;

/// Number of decimal places kept on every amount
pub const MINOR_UNIT_PLACES: u32 = 2;

/// Largest amount the ledger stores (`NUMERIC(14, 2)`)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount must be positive, got {0}")]
    NotPositive(Decimal),

    #[error("Amount {0} exceeds the maximum of 999999999999.99")]
    ExceedsMaximum(Decimal),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount in the academy's billing currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a new Money value, rounded half-away-from-zero to the minor unit
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(
            MINOR_UNIT_PLACES,
            RoundingStrategy::MidpointAwayFromZero,
        ))
    }

    /// Validates a caller-supplied amount without rounding it
    ///
    /// # Arguments
    ///
    /// * `amount` - Amount as received, in major units
    ///
    /// # Errors
    ///
    /// * `MoneyError::InvalidAmount` - more than two decimal places
    /// * `MoneyError::NotPositive` - zero or negative
    /// * `MoneyError::ExceedsMaximum` - above [`MAX_AMOUNT`]
    pub fn positive(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.normalize().scale() > MINOR_UNIT_PLACES {
            return Err(MoneyError::InvalidAmount(format!(
                "{amount} has more than {MINOR_UNIT_PLACES} decimal places"
            )));
        }
        if amount <= Decimal::ZERO {
            return Err(MoneyError::NotPositive(amount));
        }
        if amount > MAX_AMOUNT {
            return Err(MoneyError::ExceedsMaximum(amount));
        }
        Ok(Self(amount))
    }

    /// Creates Money from an integer amount in minor units (e.g., paise, cents)
    pub fn from_minor(minor_units: i64) -> Self {
        Self(Decimal::new(minor_units, MINOR_UNIT_PLACES))
    }

    /// Creates a zero amount
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the amount
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is strictly positive
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Returns true if the amount is strictly negative
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Returns the smaller of two amounts
    pub fn min(self, other: Money) -> Money {
        if self <= other { self } else { other }
    }

    /// Returns the larger of two amounts
    pub fn max(self, other: Money) -> Money {
        if self >= other { self } else { other }
    }

    /// Checked addition
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` when the result leaves `Decimal` range
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Money::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Checked subtraction
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` when the result leaves `Decimal` range
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.0
            .checked_sub(other.0)
            .map(Money::new)
            .ok_or(MoneyError::Overflow)
    }

    /// Subtraction floored at zero
    pub fn saturating_sub(&self, other: &Money) -> Money {
        (*self - *other).max(Money::zero())
    }

    /// Total of any number of amounts
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` instead of panicking on an
    /// out-of-range total
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money, MoneyError> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(&m))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Decimal {
        money.0
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Money {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.0 - other.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

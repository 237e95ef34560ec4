//! Billing configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BillingPeriod, PortError, Timezone};
use crate::distribution::DistributionPlan;
use crate::error::FeeError;

/// Default day of the month invoices fall due
pub const DEFAULT_DUE_DAY: u32 = 5;

/// What to do when a payment exceeds the outstanding balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// Record the payment and report the unapplied remainder
    #[default]
    Accept,
    /// Refuse the payment; nothing is written
    Reject,
}

impl OverpaymentPolicy {
    /// Checks a planned distribution against the policy
    ///
    /// Adapters call this inside the unit of work, after the open invoices
    /// have been locked and before anything is written.
    pub fn check(&self, plan: &DistributionPlan) -> Result<(), PortError> {
        match self {
            OverpaymentPolicy::Accept => Ok(()),
            OverpaymentPolicy::Reject if plan.is_overpayment() => Err(PortError::validation_field(
                format!(
                    "Payment of {} exceeds outstanding balance of {}",
                    plan.amount,
                    plan.total_applied()
                ),
                "amount",
            )),
            OverpaymentPolicy::Reject => Ok(()),
        }
    }
}

impl fmt::Display for OverpaymentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverpaymentPolicy::Accept => f.write_str("accept"),
            OverpaymentPolicy::Reject => f.write_str("reject"),
        }
    }
}

impl FromStr for OverpaymentPolicy {
    type Err = FeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(OverpaymentPolicy::Accept),
            "reject" => Ok(OverpaymentPolicy::Reject),
            other => Err(FeeError::validation(format!(
                "Unknown overpayment policy '{other}', expected accept or reject"
            ))),
        }
    }
}

/// Settings that shape invoice generation and collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Day of month invoices fall due, clamped to the month length
    pub due_day: u32,
    /// Academy timezone used to decide "today"
    pub timezone: Timezone,
    pub overpayment_policy: OverpaymentPolicy,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            due_day: DEFAULT_DUE_DAY,
            timezone: Timezone::default(),
            overpayment_policy: OverpaymentPolicy::default(),
        }
    }
}

impl BillingConfig {
    pub fn with_due_day(mut self, due_day: u32) -> Self {
        self.due_day = due_day;
        self
    }

    pub fn with_timezone(mut self, timezone: Timezone) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_overpayment_policy(mut self, policy: OverpaymentPolicy) -> Self {
        self.overpayment_policy = policy;
        self
    }

    /// Rejects a due day outside 1..=31
    pub fn validate(&self) -> Result<(), FeeError> {
        // Any period works; the due day range does not depend on the month
        BillingPeriod::new(1, 2000)?.due_date(self.due_day)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::plan_distribution;
    use core_kernel::Money;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = BillingConfig::default();
        assert_eq!(config.due_day, 5);
        assert_eq!(config.overpayment_policy, OverpaymentPolicy::Accept);
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_due_day() {
        assert!(BillingConfig::default().with_due_day(0).validate().is_err());
        assert!(BillingConfig::default().with_due_day(32).validate().is_err());
        BillingConfig::default().with_due_day(31).validate().unwrap();
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("Reject".parse::<OverpaymentPolicy>().unwrap(), OverpaymentPolicy::Reject);
        assert!("refund".parse::<OverpaymentPolicy>().is_err());
    }

    #[test]
    fn test_reject_policy_refuses_remainder() {
        let plan = plan_distribution(&[], Money::new(dec!(100)));
        assert!(OverpaymentPolicy::Accept.check(&plan).is_ok());
        let err = OverpaymentPolicy::Reject.check(&plan).unwrap_err();
        assert!(matches!(err, PortError::Validation { field: Some(ref f), .. } if f == "amount"));
    }
}

//! API configuration

use serde::Deserialize;
use std::time::Duration;

use core_kernel::Timezone;
use domain_fees::{BillingConfig, OverpaymentPolicy, DEFAULT_DUE_DAY};
use infra_db::DatabaseConfig;

/// API configuration
///
/// Every field can be set through an `APP_`-prefixed environment variable,
/// e.g. `APP_PORT=9000` or `APP_OVERPAYMENT_POLICY=reject`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_connect_timeout_secs: u64,
    /// Day of month invoices fall due
    pub due_day: u32,
    /// IANA name of the academy timezone
    pub timezone: String,
    /// `accept` or `reject`
    pub overpayment_policy: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/academy".to_string(),
            log_level: "info".to_string(),
            db_max_connections: 10,
            db_min_connections: 2,
            db_connect_timeout_secs: 30,
            due_day: DEFAULT_DUE_DAY,
            timezone: "UTC".to_string(),
            overpayment_policy: "accept".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("APP").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pool settings for the ledger database
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.db_max_connections)
            .min_connections(self.db_min_connections)
            .connect_timeout(Duration::from_secs(self.db_connect_timeout_secs))
    }

    /// Billing rules for the fee ledger service
    pub fn billing_config(&self) -> Result<BillingConfig, config::ConfigError> {
        let timezone: Timezone = self.timezone.parse().map_err(|_| {
            config::ConfigError::Message(format!("Unknown timezone '{}'", self.timezone))
        })?;
        let policy: OverpaymentPolicy = self
            .overpayment_policy
            .parse()
            .map_err(|e| config::ConfigError::Message(format!("{e}")))?;

        let billing = BillingConfig::default()
            .with_due_day(self.due_day)
            .with_timezone(timezone)
            .with_overpayment_policy(policy);
        billing
            .validate()
            .map_err(|e| config::ConfigError::Message(format!("Invalid due day: {e}")))?;

        Ok(billing)
    }
}

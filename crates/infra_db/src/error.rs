//! Database error types
//!
//! This module defines the error types that can occur during database operations,
//! and maps them onto the port boundary so domain code never sees SQLx.

use core_kernel::PortError;
use thiserror::Error;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Entity not found in database
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Numeric value does not fit its column
    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    /// Serialization failure or deadlock; the transaction was rolled back
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped onto a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Generic SQL error
    #[error("SQL error: {0}")]
    SqlError(#[source] sqlx::Error),
}

impl DatabaseError {
    /// Creates a not found error for a specific entity type and identifier
    ///
    /// # Example
    ///
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("FeeStructure", "FEE-123");
    /// assert!(error.to_string().contains("FeeStructure"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    /// Creates a duplicate entry error
    pub fn duplicate(entity: &str, field: &str, value: impl std::fmt::Display) -> Self {
        DatabaseError::DuplicateEntry(format!(
            "{} with {} '{}' already exists",
            entity, field, value
        ))
    }

    /// Checks if this error indicates a record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Checks if this error is a constraint violation
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::ForeignKeyViolation(_)
                | DatabaseError::ConstraintViolation(_)
        )
    }

    /// Checks if this error is a connection-related issue
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }
}

/// Converts SQLx errors to more specific DatabaseError variants
///
/// PostgreSQL error codes:
/// https://www.postgresql.org/docs/current/errcodes-appendix.html
impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseError::SerializationError(error.to_string())
            }
            sqlx::Error::Database(ref db_err) => {
                let message = db_err.message().to_string();
                let code = db_err.code().map(|c| c.into_owned());
                code.as_deref()
                    .and_then(|code| DatabaseError::from_sqlstate(code, message))
                    .unwrap_or(DatabaseError::SqlError(error))
            }
            other => DatabaseError::SqlError(other),
        }
    }
}

impl DatabaseError {
    /// Classifies a PostgreSQL error code
    ///
    /// # Returns
    ///
    /// `None` for codes without a dedicated variant
    fn from_sqlstate(code: &str, message: String) -> Option<Self> {
        match code {
            "23505" => Some(DatabaseError::DuplicateEntry(message)),
            "23503" => Some(DatabaseError::ForeignKeyViolation(message)),
            "23514" => Some(DatabaseError::ConstraintViolation(message)),
            "22003" => Some(DatabaseError::ValueOutOfRange(message)),
            "40001" | "40P01" => Some(DatabaseError::TransactionFailed(message)),
            _ => None,
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound(message) => PortError::NotFound {
                entity_type: "Record".to_string(),
                id: message,
            },
            DatabaseError::DuplicateEntry(message)
            | DatabaseError::ConstraintViolation(message)
            | DatabaseError::TransactionFailed(message) => PortError::conflict(message),
            DatabaseError::ForeignKeyViolation(message)
            | DatabaseError::ValueOutOfRange(message) => PortError::validation(message),
            DatabaseError::ConnectionFailed(message) => PortError::connection(message),
            DatabaseError::PoolExhausted => PortError::Timeout {
                operation: "acquire connection".to_string(),
                duration_ms: 0,
            },
            DatabaseError::SqlError(source) => PortError::Internal {
                message: "database query failed".to_string(),
                source: Some(Box::new(source)),
            },
            other => PortError::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error = DatabaseError::from(sqlx::Error::RowNotFound);
        assert!(error.is_not_found());
        assert!(PortError::from(error).is_not_found());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let error = DatabaseError::from(sqlx::Error::PoolTimedOut);
        assert!(error.is_connection_error());
        assert!(PortError::from(error).is_transient());
    }

    #[test]
    fn test_numeric_overflow_is_a_validation_error() {
        let error = DatabaseError::from_sqlstate("22003", "numeric field overflow".to_string())
            .unwrap();
        assert!(matches!(error, DatabaseError::ValueOutOfRange(_)));
        assert!(matches!(PortError::from(error), PortError::Validation { field: None, .. }));
    }

    #[test]
    fn test_unclassified_sqlstate_falls_through() {
        assert!(DatabaseError::from_sqlstate("42601", "syntax error".to_string()).is_none());
        assert!(matches!(
            DatabaseError::from_sqlstate("40P01", "deadlock detected".to_string()),
            Some(DatabaseError::TransactionFailed(_))
        ));
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let error = DatabaseError::duplicate("FeeStructure", "name", "Karate");
        assert!(error.is_constraint_violation());
        assert!(PortError::from(error).is_conflict());
    }
}

//! Error types for the position store

use bigdecimal::BigDecimal;
use thiserror::Error;

use crate::query::QueryableField;

/// Result type for position store operations
pub type PositionStoreResult<T> = Result<T, PositionStoreError>;

#[derive(Error, Debug)]
pub enum PositionStoreError {
    /// Database operation failed (connection, query execution, etc.)
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Referenced subaccount or asset does not exist (SQLSTATE 23503)
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Unique constraint violated (SQLSTATE 23505)
    #[error("Unique violation: {0}")]
    UniqueViolation(String),

    /// The caller declared a filter field mandatory but did not set it
    #[error("Missing required field: {0}")]
    MissingRequiredField(QueryableField),

    /// Sizes are magnitudes; the sign lives in `is_long`
    #[error("Position size must be non-negative, got {0}")]
    NegativeSize(BigDecimal),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for PositionStoreError {
    fn from(err: sqlx::Error) -> Self {
        let classified = err.as_database_error().and_then(|db_err| {
            let code = db_err.code()?.into_owned();
            Some((code, db_err.message().to_string()))
        });

        match classified {
            // PostgreSQL foreign key violation error code: 23503
            Some((code, message)) if code == "23503" => {
                PositionStoreError::ForeignKeyViolation(message)
            }
            // PostgreSQL unique violation error code: 23505
            Some((code, message)) if code == "23505" => {
                PositionStoreError::UniqueViolation(message)
            }
            _ => PositionStoreError::Database(err),
        }
    }
}

impl PositionStoreError {
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, PositionStoreError::ForeignKeyViolation(_))
    }

    /// Check if error is transient (should retry)
    pub fn is_transient(&self) -> bool {
        match self {
            PositionStoreError::Database(sqlx_err) => matches!(
                sqlx_err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(PositionStoreError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(PositionStoreError::from(sqlx::Error::PoolClosed).is_transient());
        assert!(!PositionStoreError::from(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn test_validation_errors_are_not_transient() {
        let err = PositionStoreError::MissingRequiredField(QueryableField::SubaccountId);
        assert!(!err.is_transient());
        assert_eq!(err.to_string(), "Missing required field: subaccount_id");
    }
}

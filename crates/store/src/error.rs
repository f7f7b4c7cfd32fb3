use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unit of work or connection acquisition ran past its deadline.
    #[error("Store operation timed out: {operation}")]
    Timeout { operation: &'static str },

    /// A uniqueness constraint rejected the write.
    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    /// A persisted row could not be mapped back into a domain value.
    #[error("Corrupt {entity} row: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    /// A count does not fit the column it is written to.
    #[error("{entity} value {value} is out of range")]
    OutOfRange { entity: &'static str, value: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout {
                operation: "acquire connection",
            },
            other => StoreError::Database(other),
        }
    }
}

impl StoreError {
    pub(crate) fn corrupt(entity: &'static str, reason: impl ToString) -> Self {
        StoreError::Corrupt {
            entity,
            reason: reason.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

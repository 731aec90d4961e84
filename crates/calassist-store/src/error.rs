//! Store error types.

use std::io;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness or foreign-key constraint rejected the write.
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// The caller supplied a value the store refuses to persist.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// SQLite failure or a poisoned connection lock.
    #[error("Database error: {message}")]
    Database { message: String },

    /// Creating the database directory failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Returns true for uniqueness and foreign-key rejections.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref failure, ref detail)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                Self::constraint(detail.clone().unwrap_or_else(|| failure.to_string()))
            }
            other => Self::database(other.to_string()),
        }
    }
}

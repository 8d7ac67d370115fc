//! Database Error Types
//!
//! This module defines error types for store operations, providing
//! clear error handling for connection, initialization, query and
//! transaction failures.

use std::path::PathBuf;
use thiserror::Error;

/// Store operation errors
///
/// Any failure inside an atomic tree operation surfaces as one of these;
/// the enclosing transaction is rolled back before it reaches the caller.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to bootstrap the nested-set table
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Failed to create parent directory
    #[error("Failed to create parent directory for database: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// BEGIN / COMMIT / ROLLBACK failed
    #[error("Transaction failed: {context}")]
    TransactionFailed { context: String },

    /// A row could not be decoded into a node
    #[error("Invalid row: {context}")]
    InvalidRow { context: String },
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a transaction error with context
    pub fn transaction_failed(context: impl Into<String>) -> Self {
        Self::TransactionFailed {
            context: context.into(),
        }
    }

    /// Create an invalid row error
    pub fn invalid_row(context: impl Into<String>) -> Self {
        Self::InvalidRow {
            context: context.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DatabaseError::sql_execution("Failed to shift lft").to_string(),
            "SQL execution failed: Failed to shift lft"
        );
        assert_eq!(
            DatabaseError::transaction_failed("commit").to_string(),
            "Transaction failed: commit"
        );
        assert_eq!(
            DatabaseError::invalid_row("lft is NULL").to_string(),
            "Invalid row: lft is NULL"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: DatabaseError = io.into();
        assert!(matches!(err, DatabaseError::DirectoryCreationFailed(_)));
    }
}

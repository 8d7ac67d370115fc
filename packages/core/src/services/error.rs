//! Service Layer Error Types
//!
//! Errors raised while standing up a `NestedSetService`. Tree operations
//! themselves report `TreeOperationError`.

use crate::config::ConfigError;
use crate::db::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration rejected before touching the database
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database could not be opened or bootstrapped
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),
}

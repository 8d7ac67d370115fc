//! Services
//!
//! - `NestedSetService` - create/move with per-scope serialization, plus reads
//! - `ScopeLocks` - one async lock per scope
//! - `check_integrity` - invariant checker over one scope's snapshot
//!
//! Services coordinate between the database layer and the tree operations.

pub mod error;
pub mod integrity;
pub mod scope_locks;
pub mod tree_service;

pub use error::ServiceError;
pub use integrity::{check_integrity, IntegrityViolation};
pub use scope_locks::{ScopeGuard, ScopeLocks};
pub use tree_service::NestedSetService;

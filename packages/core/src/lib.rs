//! Nested-Set Tree Core
//!
//! Maintains trees stored as rows of a relational table using the nested-set
//! model: every node carries `lft`/`rgt` bounds, a depth, a parent reference
//! and a children count, and interval containment encodes ancestry.
//!
//! # Architecture
//!
//! - **Two operations**: `create` (new root or last child) and `move_to`
//!   (`Before`, `After` or `Inner` relative to a reference node)
//! - **One transaction each**: every operation commits as a whole or not at all
//! - **Scoped forests**: an optional scope column partitions one table into
//!   independent trees
//! - **libsql/Turso**: embedded SQLite-compatible storage behind a narrow
//!   store trait
//!
//! # Modules
//!
//! - [`models`] - Node coordinates, scopes, column bindings, move directions
//! - [`operations`] - RangeShifter, Relocator and TreeMutator
//! - [`services`] - `NestedSetService` facade, scope locks, integrity checks
//! - [`db`] - Store contract, libsql and in-memory implementations
//! - [`config`] - Database location and column bindings

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::{ConfigError, NestedSetConfig};
pub use db::{DatabaseError, MemoryStore, TreeStore, TreeTransaction, TursoStore};
pub use models::*;
pub use operations::{TreeMutator, TreeOperationError};
pub use services::*;

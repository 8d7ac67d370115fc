//! Database Layer
//!
//! This module handles all database interactions using libsql/Turso:
//!
//! - Database initialization and connection management (`DatabaseService`)
//! - The narrow store contract the tree algorithm runs against (`TreeStore`)
//! - The libsql implementation of that contract (`TursoStore`)
//! - An in-process implementation for tests and embedded trees (`MemoryStore`)
//!
//! # Architecture
//!
//! The nested-set operations only ever talk to `TreeStore` /
//! `TreeTransaction`. Everything about column names, scope predicates and
//! SQL text lives behind that seam.

mod database;
mod error;
mod memory_store;
mod node_store;
mod turso_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use memory_store::{MemoryStore, MemoryTransaction};
pub use node_store::{BoundPredicate, TreeStore, TreeTransaction};
pub use turso_store::{TursoStore, TursoTransaction};

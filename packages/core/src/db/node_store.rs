//! TreeStore Trait - Relational Store Abstraction
//!
//! This module defines the narrow storage interface the nested-set
//! algorithm runs against. The tree operations never build SQL themselves;
//! they call these methods inside one `TreeTransaction`.
//!
//! # Architecture
//!
//! - **Abstraction Point**: Between the tree operations and the SQL backend
//! - **Transaction-scoped**: Every read and write goes through a transaction
//!   opened by `TreeStore::begin`, so an operation's reads observe the same
//!   snapshot its writes are applied to
//! - **Scope-scoped**: Every method takes the `Scope` it is confined to
//!
//! # Isolation Contract
//!
//! `begin` must return a transaction that is serializable with respect to
//! every other transaction touching the same scope: two concurrent
//! create/move sequences on one scope must never interleave their
//! read-compute-write steps. `TursoStore` meets this by taking SQLite's
//! write lock up front (`BEGIN IMMEDIATE`). Implementations with weaker
//! isolation must lock the affected scope themselves.
//!
//! `begin_read` only has to provide a consistent snapshot; `TursoStore` uses
//! a deferred `BEGIN` so readers neither wait for nor block writers.
//!
//! Dropping a transaction without calling `commit` must discard all of its
//! writes.

use crate::db::DatabaseError;
use crate::models::{ColumnMap, CoordinateColumn, NodeDescriptor, Placement, Scope};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Row filter on one coordinate column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundPredicate {
    /// `column >= k`
    AtLeast(i64),
    /// `column > k`
    GreaterThan(i64),
    /// `column BETWEEN lo AND hi` (inclusive)
    Between(i64, i64),
}

impl BoundPredicate {
    /// Whether `value` satisfies the predicate
    pub fn matches(&self, value: i64) -> bool {
        match *self {
            BoundPredicate::AtLeast(k) => value >= k,
            BoundPredicate::GreaterThan(k) => value > k,
            BoundPredicate::Between(lo, hi) => lo <= value && value <= hi,
        }
    }
}

/// Factory for isolated write transactions over one nested-set table
#[async_trait]
pub trait TreeStore: Send + Sync {
    type Transaction: TreeTransaction;

    /// Column bindings every statement is rendered from
    fn columns(&self) -> &ColumnMap;

    /// Open an isolated write transaction
    async fn begin(&self) -> Result<Self::Transaction, DatabaseError>;

    /// Open a transaction that only reads
    ///
    /// It must still see one consistent snapshot, but it need not exclude
    /// writers. Defaults to `begin`.
    async fn begin_read(&self) -> Result<Self::Transaction, DatabaseError> {
        self.begin().await
    }
}

/// One all-or-nothing unit of reads and writes
///
/// Method names follow the Relational Store operations: `read_max`,
/// `conditional_shift`, the `update` family (`offset_nodes`, `set_parent`,
/// `set_children_count`, `increment_children_count`), `count_children`,
/// plus the node-level reads and the insert the tree operations need.
#[async_trait]
pub trait TreeTransaction: Send {
    /// Fresh read of one node's coordinates
    async fn fetch_node(
        &mut self,
        scope: &Scope,
        id: i64,
    ) -> Result<Option<NodeDescriptor>, DatabaseError>;

    /// Maximum of `column` over the scope (`None` when the scope is empty)
    async fn read_max(
        &mut self,
        scope: &Scope,
        column: CoordinateColumn,
    ) -> Result<Option<i64>, DatabaseError>;

    /// Add `step` to `column` on every row in scope whose `column` satisfies
    /// `predicate`; returns the number of rows changed
    async fn conditional_shift(
        &mut self,
        scope: &Scope,
        column: CoordinateColumn,
        predicate: BoundPredicate,
        step: i64,
    ) -> Result<u64, DatabaseError>;

    /// Ids of every node whose interval lies within `[lft, rgt]`
    async fn subtree_ids(
        &mut self,
        scope: &Scope,
        lft: i64,
        rgt: i64,
    ) -> Result<Vec<i64>, DatabaseError>;

    /// Add `step` to both bounds and `depth_change` to depth of the given rows
    async fn offset_nodes(
        &mut self,
        scope: &Scope,
        ids: &[i64],
        step: i64,
        depth_change: i64,
    ) -> Result<u64, DatabaseError>;

    async fn set_parent(
        &mut self,
        scope: &Scope,
        id: i64,
        parent_id: Option<i64>,
    ) -> Result<u64, DatabaseError>;

    /// Number of rows whose parent is `parent_id`
    async fn count_children(&mut self, scope: &Scope, parent_id: i64)
        -> Result<i64, DatabaseError>;

    async fn set_children_count(
        &mut self,
        scope: &Scope,
        id: i64,
        count: i64,
    ) -> Result<u64, DatabaseError>;

    async fn increment_children_count(
        &mut self,
        scope: &Scope,
        id: i64,
        by: i64,
    ) -> Result<u64, DatabaseError>;

    /// Write a new row; returns its id (store-assigned when `placement.id` is `None`)
    async fn insert_node(
        &mut self,
        scope: &Scope,
        placement: &Placement,
        attributes: &Map<String, Value>,
    ) -> Result<i64, DatabaseError>;

    /// Every node in scope, ordered by `lft`
    async fn list_nodes(&mut self, scope: &Scope) -> Result<Vec<NodeDescriptor>, DatabaseError>;

    async fn commit(self) -> Result<(), DatabaseError>;

    async fn rollback(self) -> Result<(), DatabaseError>;
}

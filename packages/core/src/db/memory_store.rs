//! MemoryStore - in-process TreeStore
//!
//! Keeps every row in memory behind one async mutex. A transaction holds the
//! mutex for its whole lifetime and works on a private copy of the state;
//! `commit` publishes the copy, `rollback` or drop throws it away. That makes
//! every transaction serializable against every other one, which is stricter
//! than the per-scope contract `TreeStore` requires.
//!
//! Useful for tests and for callers that keep a tree in process.

use crate::db::node_store::{BoundPredicate, TreeStore, TreeTransaction};
use crate::db::DatabaseError;
use crate::models::{ColumnMap, CoordinateColumn, NodeDescriptor, Placement, Scope};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone)]
struct MemoryRow {
    node: NodeDescriptor,
    attributes: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    rows: Vec<MemoryRow>,
    last_id: i64,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    columns: ColumnMap,
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(ColumnMap::default())
    }
}

impl MemoryStore {
    pub fn new(columns: ColumnMap) -> Self {
        Self {
            columns,
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Store partitioned by a scope column
    pub fn scoped(scope_column: impl Into<String>) -> Self {
        Self::new(ColumnMap::scoped(scope_column))
    }

    /// Payload columns stored with a node
    pub async fn attributes(&self, scope: &Scope, id: i64) -> Option<Map<String, Value>> {
        let state = self.state.lock().await;
        state
            .rows
            .iter()
            .find(|row| row.node.id == id && row.node.scope == *scope)
            .map(|row| row.attributes.clone())
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    type Transaction = MemoryTransaction;

    fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    async fn begin(&self) -> Result<MemoryTransaction, DatabaseError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryTransaction {
            guard,
            working,
            columns: self.columns.clone(),
        })
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    columns: ColumnMap,
}

impl MemoryTransaction {
    fn check_scope(&self, scope: &Scope) -> Result<(), DatabaseError> {
        scope
            .check(&self.columns)
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    fn rows_in<'a>(&'a self, scope: &'a Scope) -> impl Iterator<Item = &'a MemoryRow> + 'a {
        self.working
            .rows
            .iter()
            .filter(move |row| row.node.scope == *scope)
    }

    fn rows_in_mut<'a>(
        &'a mut self,
        scope: &'a Scope,
    ) -> impl Iterator<Item = &'a mut MemoryRow> + 'a {
        self.working
            .rows
            .iter_mut()
            .filter(move |row| row.node.scope == *scope)
    }
}

fn coordinate(node: &mut NodeDescriptor, column: CoordinateColumn) -> &mut i64 {
    match column {
        CoordinateColumn::Left => &mut node.lft,
        CoordinateColumn::Right => &mut node.rgt,
    }
}

#[async_trait]
impl TreeTransaction for MemoryTransaction {
    async fn fetch_node(
        &mut self,
        scope: &Scope,
        id: i64,
    ) -> Result<Option<NodeDescriptor>, DatabaseError> {
        self.check_scope(scope)?;
        Ok(self
            .rows_in(scope)
            .find(|row| row.node.id == id)
            .map(|row| row.node.clone()))
    }

    async fn read_max(
        &mut self,
        scope: &Scope,
        column: CoordinateColumn,
    ) -> Result<Option<i64>, DatabaseError> {
        self.check_scope(scope)?;
        Ok(self
            .rows_in(scope)
            .map(|row| {
                let mut node = row.node.clone();
                *coordinate(&mut node, column)
            })
            .max())
    }

    async fn conditional_shift(
        &mut self,
        scope: &Scope,
        column: CoordinateColumn,
        predicate: BoundPredicate,
        step: i64,
    ) -> Result<u64, DatabaseError> {
        self.check_scope(scope)?;
        let mut changed = 0;
        for row in self.rows_in_mut(scope) {
            let value = coordinate(&mut row.node, column);
            if predicate.matches(*value) {
                *value += step;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn subtree_ids(
        &mut self,
        scope: &Scope,
        lft: i64,
        rgt: i64,
    ) -> Result<Vec<i64>, DatabaseError> {
        self.check_scope(scope)?;
        Ok(self
            .rows_in(scope)
            .filter(|row| row.node.lft >= lft && row.node.rgt <= rgt)
            .map(|row| row.node.id)
            .collect())
    }

    async fn offset_nodes(
        &mut self,
        scope: &Scope,
        ids: &[i64],
        step: i64,
        depth_change: i64,
    ) -> Result<u64, DatabaseError> {
        self.check_scope(scope)?;
        let mut changed = 0;
        for row in self.rows_in_mut(scope) {
            if ids.contains(&row.node.id) {
                row.node.lft += step;
                row.node.rgt += step;
                row.node.depth += depth_change;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn set_parent(
        &mut self,
        scope: &Scope,
        id: i64,
        parent_id: Option<i64>,
    ) -> Result<u64, DatabaseError> {
        self.check_scope(scope)?;
        let mut changed = 0;
        for row in self.rows_in_mut(scope).filter(|row| row.node.id == id) {
            row.node.parent_id = parent_id;
            changed += 1;
        }
        Ok(changed)
    }

    async fn count_children(
        &mut self,
        scope: &Scope,
        parent_id: i64,
    ) -> Result<i64, DatabaseError> {
        self.check_scope(scope)?;
        Ok(self
            .rows_in(scope)
            .filter(|row| row.node.parent_id == Some(parent_id))
            .count() as i64)
    }

    async fn set_children_count(
        &mut self,
        scope: &Scope,
        id: i64,
        count: i64,
    ) -> Result<u64, DatabaseError> {
        self.check_scope(scope)?;
        let mut changed = 0;
        for row in self.rows_in_mut(scope).filter(|row| row.node.id == id) {
            row.node.children_count = count;
            changed += 1;
        }
        Ok(changed)
    }

    async fn increment_children_count(
        &mut self,
        scope: &Scope,
        id: i64,
        by: i64,
    ) -> Result<u64, DatabaseError> {
        self.check_scope(scope)?;
        let mut changed = 0;
        for row in self.rows_in_mut(scope).filter(|row| row.node.id == id) {
            row.node.children_count += by;
            changed += 1;
        }
        Ok(changed)
    }

    async fn insert_node(
        &mut self,
        scope: &Scope,
        placement: &Placement,
        attributes: &Map<String, Value>,
    ) -> Result<i64, DatabaseError> {
        self.check_scope(scope)?;

        let id = placement.id.unwrap_or(self.working.last_id + 1);
        if self.working.rows.iter().any(|row| row.node.id == id) {
            return Err(DatabaseError::sql_execution(format!(
                "UNIQUE constraint failed: {}.{} = {}",
                self.columns.table, self.columns.id, id
            )));
        }
        self.working.last_id = self.working.last_id.max(id);

        self.working.rows.push(MemoryRow {
            node: placement.clone().into_descriptor(id, scope.clone()),
            attributes: attributes.clone(),
        });
        Ok(id)
    }

    async fn list_nodes(&mut self, scope: &Scope) -> Result<Vec<NodeDescriptor>, DatabaseError> {
        self.check_scope(scope)?;
        let mut nodes: Vec<NodeDescriptor> =
            self.rows_in(scope).map(|row| row.node.clone()).collect();
        nodes.sort_by_key(|node| (node.lft, node.id));
        Ok(nodes)
    }

    async fn commit(mut self) -> Result<(), DatabaseError> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }

    async fn rollback(self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

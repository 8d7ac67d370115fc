//! Shared helpers for integration tests
//!
//! - `create_test_env` / `create_scoped_env`: a service over a fresh libsql file
//! - `FailingStore`: wraps any store and fails the N-th write of a transaction
//! - `snapshot`: coordinates of every node in a scope, by id

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use nestedset_core::db::BoundPredicate;
use nestedset_core::{
    ColumnMap, CoordinateColumn, DatabaseError, NestedSetConfig, NestedSetService,
    NodeDescriptor, Placement, Scope, TreeStore, TreeTransaction, TursoStore,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

pub fn test_config(temp_dir: &TempDir) -> NestedSetConfig {
    NestedSetConfig::new(temp_dir.path().join("test.db"))
}

/// Test helper: service over an unscoped table
pub async fn create_test_env() -> Result<(NestedSetService<TursoStore>, TempDir)> {
    init_tracing();
    let temp_dir = TempDir::new()?;
    let service = NestedSetService::open(&test_config(&temp_dir)).await?;
    Ok((service, temp_dir))
}

/// Test helper: service over a table partitioned by `scope_column`
pub async fn create_scoped_env(
    scope_column: &str,
) -> Result<(NestedSetService<TursoStore>, TempDir)> {
    init_tracing();
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir).with_columns(ColumnMap::scoped(scope_column));
    let service = NestedSetService::open(&config).await?;
    Ok((service, temp_dir))
}

/// Every node of `scope`, sorted by id
pub async fn snapshot<S: TreeStore>(
    service: &NestedSetService<S>,
    scope: &Scope,
) -> Result<Vec<NodeDescriptor>> {
    let mut nodes = service.list_nodes(scope).await?;
    nodes.sort_by_key(|node| node.id);
    Ok(nodes)
}

/// `(lft, rgt, depth, children_count)` of one node
pub async fn coords<S: TreeStore>(
    service: &NestedSetService<S>,
    scope: &Scope,
    id: i64,
) -> Result<(i64, i64, i64, i64)> {
    let node = service
        .get_node(scope, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("node {} missing", id))?;
    Ok((node.lft, node.rgt, node.depth, node.children_count))
}

/// Store wrapper that injects a failure into the N-th write of every
/// transaction and counts how many transactions were opened
#[derive(Clone)]
pub struct FailingStore<S> {
    inner: S,
    fail_at: Arc<AtomicUsize>,
    begins: Arc<AtomicUsize>,
}

impl<S: TreeStore> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_at: Arc::new(AtomicUsize::new(usize::MAX)),
            begins: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail the write with zero-based index `n`
    pub fn fail_at_write(&self, n: usize) {
        self.fail_at.store(n, Ordering::SeqCst);
    }

    pub fn never_fail(&self) {
        self.fail_at.store(usize::MAX, Ordering::SeqCst);
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: TreeStore> TreeStore for FailingStore<S> {
    type Transaction = FailingTransaction<S::Transaction>;

    fn columns(&self) -> &ColumnMap {
        self.inner.columns()
    }

    async fn begin(&self) -> Result<Self::Transaction, DatabaseError> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        Ok(FailingTransaction {
            inner: self.inner.begin().await?,
            writes: 0,
            fail_at: self.fail_at.load(Ordering::SeqCst),
        })
    }

    // Reads are not counted and never fail
    async fn begin_read(&self) -> Result<Self::Transaction, DatabaseError> {
        Ok(FailingTransaction {
            inner: self.inner.begin_read().await?,
            writes: 0,
            fail_at: usize::MAX,
        })
    }
}

pub struct FailingTransaction<T> {
    inner: T,
    writes: usize,
    fail_at: usize,
}

impl<T> FailingTransaction<T> {
    fn write(&mut self) -> Result<(), DatabaseError> {
        let index = self.writes;
        self.writes += 1;
        if index == self.fail_at {
            return Err(DatabaseError::sql_execution(format!(
                "injected failure at write {}",
                index
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<T: TreeTransaction> TreeTransaction for FailingTransaction<T> {
    async fn fetch_node(
        &mut self,
        scope: &Scope,
        id: i64,
    ) -> Result<Option<NodeDescriptor>, DatabaseError> {
        self.inner.fetch_node(scope, id).await
    }

    async fn read_max(
        &mut self,
        scope: &Scope,
        column: CoordinateColumn,
    ) -> Result<Option<i64>, DatabaseError> {
        self.inner.read_max(scope, column).await
    }

    async fn conditional_shift(
        &mut self,
        scope: &Scope,
        column: CoordinateColumn,
        predicate: BoundPredicate,
        step: i64,
    ) -> Result<u64, DatabaseError> {
        self.write()?;
        self.inner
            .conditional_shift(scope, column, predicate, step)
            .await
    }

    async fn subtree_ids(
        &mut self,
        scope: &Scope,
        lft: i64,
        rgt: i64,
    ) -> Result<Vec<i64>, DatabaseError> {
        self.inner.subtree_ids(scope, lft, rgt).await
    }

    async fn offset_nodes(
        &mut self,
        scope: &Scope,
        ids: &[i64],
        step: i64,
        depth_change: i64,
    ) -> Result<u64, DatabaseError> {
        self.write()?;
        self.inner
            .offset_nodes(scope, ids, step, depth_change)
            .await
    }

    async fn set_parent(
        &mut self,
        scope: &Scope,
        id: i64,
        parent_id: Option<i64>,
    ) -> Result<u64, DatabaseError> {
        self.write()?;
        self.inner.set_parent(scope, id, parent_id).await
    }

    async fn count_children(&mut self, scope: &Scope, parent_id: i64) -> Result<i64, DatabaseError> {
        self.inner.count_children(scope, parent_id).await
    }

    async fn set_children_count(
        &mut self,
        scope: &Scope,
        id: i64,
        count: i64,
    ) -> Result<u64, DatabaseError> {
        self.write()?;
        self.inner.set_children_count(scope, id, count).await
    }

    async fn increment_children_count(
        &mut self,
        scope: &Scope,
        id: i64,
        by: i64,
    ) -> Result<u64, DatabaseError> {
        self.write()?;
        self.inner.increment_children_count(scope, id, by).await
    }

    async fn insert_node(
        &mut self,
        scope: &Scope,
        placement: &Placement,
        attributes: &Map<String, Value>,
    ) -> Result<i64, DatabaseError> {
        self.write()?;
        self.inner.insert_node(scope, placement, attributes).await
    }

    async fn list_nodes(&mut self, scope: &Scope) -> Result<Vec<NodeDescriptor>, DatabaseError> {
        self.inner.list_nodes(scope).await
    }

    async fn commit(self) -> Result<(), DatabaseError> {
        self.inner.commit().await
    }

    async fn rollback(self) -> Result<(), DatabaseError> {
        self.inner.rollback().await
    }
}

//! NestedSetService - public facade over one nested-set table
//!
//! Wraps a `TreeMutator` with per-scope serialization and adds the read
//! side: single-node lookups, scope listings, interval-containment queries
//! and the integrity check.
//!
//! # Concurrency
//!
//! `create` and `move_to` hold the scope's `ScopeLocks` guard from before
//! the store transaction opens until after it commits or rolls back. The
//! store transaction itself is the second line of serialization, covering
//! writers in other processes. Reads take no scope lock and open their
//! snapshot with `TreeStore::begin_read`, so on libsql they do not queue
//! behind a running Create or Move.

use crate::config::NestedSetConfig;
use crate::db::{TreeStore, TreeTransaction, TursoStore};
use crate::models::{MoveDirection, NodeDescriptor, Scope, TreeRecord};
use crate::operations::{TreeMutator, TreeOperationError};
use crate::services::error::ServiceError;
use crate::services::integrity::{check_integrity, IntegrityViolation};
use crate::services::scope_locks::ScopeLocks;

pub struct NestedSetService<S: TreeStore> {
    mutator: TreeMutator<S>,
    locks: ScopeLocks,
}

impl NestedSetService<TursoStore> {
    /// Open the libsql database described by `config`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use nestedset_core::{NestedSetConfig, NestedSetService, TreeNode};
    /// # async fn example() -> anyhow::Result<()> {
    /// let service = NestedSetService::open(&NestedSetConfig::new("./tree.db")).await?;
    /// let root = service.create_root(&mut TreeNode::default()).await?;
    /// service.create_child(&mut TreeNode::default(), &root).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn open(config: &NestedSetConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let store = TursoStore::open(config).await?;
        Ok(Self::new(store))
    }
}

impl<S: TreeStore> NestedSetService<S> {
    pub fn new(store: S) -> Self {
        Self {
            mutator: TreeMutator::new(store),
            locks: ScopeLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        self.mutator.store()
    }

    /// Insert `record` as a new root or as the last child of `parent`
    pub async fn create<R, P>(
        &self,
        record: &mut R,
        parent: Option<&P>,
    ) -> Result<NodeDescriptor, TreeOperationError>
    where
        R: TreeRecord + ?Sized,
        P: TreeRecord + ?Sized,
    {
        let _guard = self.locks.acquire(&record.scope()).await;
        self.mutator.create(record, parent).await
    }

    pub async fn create_root<R>(&self, record: &mut R) -> Result<NodeDescriptor, TreeOperationError>
    where
        R: TreeRecord + ?Sized,
    {
        let _guard = self.locks.acquire(&record.scope()).await;
        self.mutator.create_root(record).await
    }

    pub async fn create_child<R, P>(
        &self,
        record: &mut R,
        parent: &P,
    ) -> Result<NodeDescriptor, TreeOperationError>
    where
        R: TreeRecord + ?Sized,
        P: TreeRecord + ?Sized,
    {
        let _guard = self.locks.acquire(&record.scope()).await;
        self.mutator.create_child(record, parent).await
    }

    /// Move `node` with its subtree `Before`, `After` or `Inner` to `reference`
    pub async fn move_to<N, F>(
        &self,
        node: &N,
        reference: &F,
        direction: MoveDirection,
    ) -> Result<NodeDescriptor, TreeOperationError>
    where
        N: TreeRecord + ?Sized,
        F: TreeRecord + ?Sized,
    {
        let _guard = self.locks.acquire(&node.scope()).await;
        self.mutator.move_to(node, reference, direction).await
    }

    pub async fn get_node(
        &self,
        scope: &Scope,
        id: i64,
    ) -> Result<Option<NodeDescriptor>, TreeOperationError> {
        scope.check(self.store().columns())?;
        let mut tx = self.store().begin_read().await?;
        let node = tx.fetch_node(scope, id).await;
        tx.rollback().await?;
        Ok(node?)
    }

    /// Every node in `scope`, ordered by `lft`
    pub async fn list_nodes(&self, scope: &Scope) -> Result<Vec<NodeDescriptor>, TreeOperationError> {
        scope.check(self.store().columns())?;
        let mut tx = self.store().begin_read().await?;
        let nodes = tx.list_nodes(scope).await;
        tx.rollback().await?;
        Ok(nodes?)
    }

    /// Direct children of `id`, in order
    pub async fn children(
        &self,
        scope: &Scope,
        id: i64,
    ) -> Result<Vec<NodeDescriptor>, TreeOperationError> {
        let (node, nodes) = self.with_snapshot(scope, id).await?;
        Ok(nodes
            .into_iter()
            .filter(|n| n.parent_id == Some(node.id))
            .collect())
    }

    /// Every node inside `id`'s interval, in order
    pub async fn descendants(
        &self,
        scope: &Scope,
        id: i64,
    ) -> Result<Vec<NodeDescriptor>, TreeOperationError> {
        let (node, nodes) = self.with_snapshot(scope, id).await?;
        Ok(nodes
            .into_iter()
            .filter(|n| node.is_ancestor_of(n))
            .collect())
    }

    /// Every node enclosing `id`, root first
    pub async fn ancestors(
        &self,
        scope: &Scope,
        id: i64,
    ) -> Result<Vec<NodeDescriptor>, TreeOperationError> {
        let (node, nodes) = self.with_snapshot(scope, id).await?;
        Ok(nodes
            .into_iter()
            .filter(|n| n.is_ancestor_of(&node))
            .collect())
    }

    /// Violations of the nested-set invariants in `scope`; empty when consistent
    pub async fn check_integrity(
        &self,
        scope: &Scope,
    ) -> Result<Vec<IntegrityViolation>, TreeOperationError> {
        let nodes = self.list_nodes(scope).await?;
        let violations = check_integrity(&nodes);
        if !violations.is_empty() {
            tracing::warn!(
                "Scope {} has {} integrity violations",
                scope,
                violations.len()
            );
        }
        Ok(violations)
    }

    /// One node plus the whole scope it lives in, from the same snapshot
    async fn with_snapshot(
        &self,
        scope: &Scope,
        id: i64,
    ) -> Result<(NodeDescriptor, Vec<NodeDescriptor>), TreeOperationError> {
        let nodes = self.list_nodes(scope).await?;
        let node = nodes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| TreeOperationError::node_not_found(id))?;
        Ok((node, nodes))
    }
}

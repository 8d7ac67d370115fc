//! Tree mutations: Create and Move
//!
//! Each public operation runs inside exactly one store transaction. Records
//! are resolved against the store's `ColumnMap` before the transaction is
//! opened, so mapping failures never reach the store. Everything after
//! `begin` either commits as a whole or is rolled back.

use crate::db::{TreeStore, TreeTransaction};
use crate::models::{
    resolve_insert, resolve_key, CoordinateColumn, MoveDirection, NodeDescriptor, Placement,
    Scope, TreeRecord,
};
use crate::operations::error::TreeOperationError;
use crate::operations::range_shifter::RangeShifter;
use crate::operations::relocator::Relocator;
use serde_json::{Map, Value};

/// Width of the gap a single new node occupies
const NODE_WIDTH: i64 = 2;

pub struct TreeMutator<S: TreeStore> {
    store: S,
}

impl<S: TreeStore> TreeMutator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Insert `record` as a new root, or as the last child of `parent`
    ///
    /// The parent's coordinates are re-read inside the transaction; only its
    /// id and scope are taken from the argument. On success the stored
    /// coordinates are written back through `TreeRecord::assign`.
    pub async fn create<R, P>(
        &self,
        record: &mut R,
        parent: Option<&P>,
    ) -> Result<NodeDescriptor, TreeOperationError>
    where
        R: TreeRecord + ?Sized,
        P: TreeRecord + ?Sized,
    {
        let columns = self.store.columns();
        let (scope, attributes) = resolve_insert(record, columns)?;
        let parent_id = match parent {
            Some(parent) => {
                let key = resolve_key(parent, columns)?;
                if key.scope != scope {
                    return Err(TreeOperationError::parent_scope_mismatch(
                        key.id, key.scope, scope,
                    ));
                }
                Some(key.id)
            }
            None => None,
        };
        let id = record.record_id();

        let mut tx = self.store.begin().await?;
        let result = create_in(&mut tx, &scope, id, parent_id, &attributes).await;
        let placed = finish(tx, result).await?;

        tracing::info!(
            "Created node {} at ({}, {}) depth {} ({})",
            placed.id,
            placed.lft,
            placed.rgt,
            placed.depth,
            scope
        );

        record.assign(&placed);
        Ok(placed)
    }

    /// Insert `record` as a new root
    pub async fn create_root<R>(&self, record: &mut R) -> Result<NodeDescriptor, TreeOperationError>
    where
        R: TreeRecord + ?Sized,
    {
        self.create::<R, NodeDescriptor>(record, None).await
    }

    /// Insert `record` as the last child of `parent`
    pub async fn create_child<R, P>(
        &self,
        record: &mut R,
        parent: &P,
    ) -> Result<NodeDescriptor, TreeOperationError>
    where
        R: TreeRecord + ?Sized,
        P: TreeRecord + ?Sized,
    {
        self.create(record, Some(parent)).await
    }

    /// Move `node` and its whole subtree next to, or into, `reference`
    ///
    /// Both nodes are re-read inside the transaction. Returns the moved
    /// node's coordinates after the move. A move that resolves to the
    /// node's current position is a successful no-op.
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
        let columns = self.store.columns();
        let node = resolve_key(node, columns)?;
        let reference = resolve_key(reference, columns)?;

        if node.scope != reference.scope {
            return Err(TreeOperationError::scope_mismatch(
                node.id,
                node.scope,
                reference.id,
                reference.scope,
            ));
        }
        if node.id == reference.id {
            return Err(TreeOperationError::invalid_move(
                node.id,
                reference.id,
                "reference is the node itself",
            ));
        }

        let mut tx = self.store.begin().await?;
        let result = move_in(&mut tx, &node.scope, node.id, reference.id, direction).await;
        let moved = finish(tx, result).await?;

        tracing::info!(
            "Moved node {} {:?} node {}: now ({}, {}) depth {} ({})",
            moved.id,
            direction,
            reference.id,
            moved.lft,
            moved.rgt,
            moved.depth,
            node.scope
        );

        Ok(moved)
    }
}

/// Commit on success, roll back on failure
async fn finish<T, V>(
    tx: T,
    result: Result<V, TreeOperationError>,
) -> Result<V, TreeOperationError>
where
    T: TreeTransaction,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            tracing::warn!("Rolling back tree operation: {}", err);
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

async fn fetch_existing<T: TreeTransaction>(
    tx: &mut T,
    scope: &Scope,
    id: i64,
) -> Result<NodeDescriptor, TreeOperationError> {
    tx.fetch_node(scope, id)
        .await?
        .ok_or_else(|| TreeOperationError::node_not_found(id))
}

async fn create_in<T: TreeTransaction>(
    tx: &mut T,
    scope: &Scope,
    id: Option<i64>,
    parent_id: Option<i64>,
    attributes: &Map<String, Value>,
) -> Result<NodeDescriptor, TreeOperationError> {
    let placement = match parent_id {
        Some(parent_id) => {
            let parent = fetch_existing(tx, scope, parent_id).await?;
            let placement = Placement::last_child_of(id, &parent);
            tracing::debug!(
                "New child of {} goes to ({}, {})",
                parent.id,
                placement.lft,
                placement.rgt
            );
            let gap = RangeShifter::open_gap(tx, scope, placement.lft, NODE_WIDTH).await?;
            tracing::debug!(
                "Gap opened: {} lft / {} rgt bounds moved",
                gap.lft_rows,
                gap.rgt_rows
            );
            tx.increment_children_count(scope, parent.id, 1).await?;
            placement
        }
        None => {
            let max_rgt = tx.read_max(scope, CoordinateColumn::Right).await?;
            let placement = Placement::root(id, max_rgt);
            tracing::debug!("New root goes to ({}, {})", placement.lft, placement.rgt);
            placement
        }
    };

    let id = tx.insert_node(scope, &placement, attributes).await?;
    Ok(placement.into_descriptor(id, scope.clone()))
}

async fn move_in<T: TreeTransaction>(
    tx: &mut T,
    scope: &Scope,
    node_id: i64,
    reference_id: i64,
    direction: MoveDirection,
) -> Result<NodeDescriptor, TreeOperationError> {
    let node = fetch_existing(tx, scope, node_id).await?;
    let reference = fetch_existing(tx, scope, reference_id).await?;

    if node.contains(&reference) {
        return Err(TreeOperationError::invalid_move(
            node_id,
            reference_id,
            "reference is a descendant of the node",
        ));
    }

    let destination = direction.destination(&node, &reference);
    Relocator::relocate(tx, scope, &node, destination).await?;

    fetch_existing(tx, scope, node_id).await
}

//! Subtree relocation
//!
//! Moving a subtree is two shifts. The affected nodes between the subtree
//! and its destination slide by the subtree's width to open (or close) the
//! gap, and the subtree itself slides by the distance left over. Which
//! window is affected and which step the subtree takes depend only on the
//! subtree's bounds and the destination position, so that part is computed
//! up front by `RelocationPlan` without touching storage.

use crate::db::{DatabaseError, TreeTransaction};
use crate::models::{Destination, NodeDescriptor, Scope};
use crate::operations::range_shifter::RangeShifter;

/// Coordinate arithmetic for one relocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationPlan {
    /// Lowest bound of the affected window (inclusive)
    pub window_lo: i64,
    /// Highest bound of the affected window (inclusive)
    pub window_hi: i64,
    /// Step applied to bounds inside the window
    pub affected_step: i64,
    /// Step applied to both bounds of every node in the moving subtree
    pub subtree_step: i64,
}

impl RelocationPlan {
    /// Plan the move of the subtree rooted at `node` so that its interval
    /// starts right after `position`
    ///
    /// Returns `None` when the subtree already sits there. That covers
    /// `position == lft - 1` as well as `position == rgt`, where the
    /// vacated space and the target gap coincide.
    pub fn new(node: &NodeDescriptor, position: i64) -> Option<Self> {
        let width = node.width();
        let move_step = position - node.lft + 1;

        let plan = match move_step.signum() {
            0 => return None,
            -1 => RelocationPlan {
                window_lo: position + 1,
                window_hi: node.lft - 1,
                affected_step: width,
                subtree_step: move_step,
            },
            _ => RelocationPlan {
                window_lo: node.rgt + 1,
                window_hi: position,
                affected_step: -width,
                subtree_step: move_step - width,
            },
        };

        if plan.subtree_step == 0 && plan.window_is_empty() {
            return None;
        }
        Some(plan)
    }

    pub fn window_is_empty(&self) -> bool {
        self.window_lo > self.window_hi
    }
}

pub struct Relocator;

impl Relocator {
    /// Move the subtree rooted at `node` to `destination`
    ///
    /// `node` must be a fresh read from `tx`. Returns the applied plan, or
    /// `None` when nothing had to change (no rows are written then, not even
    /// the children counts).
    pub async fn relocate<T: TreeTransaction>(
        tx: &mut T,
        scope: &Scope,
        node: &NodeDescriptor,
        destination: Destination,
    ) -> Result<Option<RelocationPlan>, DatabaseError> {
        let plan = match RelocationPlan::new(node, destination.position) {
            Some(plan) => plan,
            None => {
                tracing::debug!(
                    "Node {} already at position {} ({})",
                    node.id,
                    destination.position,
                    scope
                );
                return Ok(None);
            }
        };

        tracing::debug!("Relocating node {} with {:?} ({})", node.id, plan, scope);

        // Membership is fixed before any bound moves
        let subtree = tx.subtree_ids(scope, node.lft, node.rgt).await?;

        let shifted = RangeShifter::shift_window(
            tx,
            scope,
            plan.window_lo,
            plan.window_hi,
            plan.affected_step,
        )
        .await?;

        let offset = tx
            .offset_nodes(scope, &subtree, plan.subtree_step, destination.depth_change)
            .await?;
        tracing::debug!(
            "Shifted {} lft / {} rgt bounds in window, offset {} subtree rows",
            shifted.lft_rows,
            shifted.rgt_rows,
            offset
        );
        tx.set_parent(scope, node.id, destination.new_parent_id)
            .await?;

        if let Some(old_parent) = node.parent_id {
            Self::resync_children_count(tx, scope, old_parent).await?;
        }
        if let Some(new_parent) = destination.new_parent_id {
            if node.parent_id != Some(new_parent) {
                Self::resync_children_count(tx, scope, new_parent).await?;
            }
        }

        Ok(Some(plan))
    }

    async fn resync_children_count<T: TreeTransaction>(
        tx: &mut T,
        scope: &Scope,
        parent_id: i64,
    ) -> Result<(), DatabaseError> {
        let count = tx.count_children(scope, parent_id).await?;
        tx.set_children_count(scope, parent_id, count).await?;
        Ok(())
    }
}

//! Range shifting
//!
//! Every structural change to a nested set reduces to "add a constant to
//! each bound that falls in a window". The left and right bounds are
//! shifted by two independent conditional updates, so a node straddling the
//! window edge (only one bound inside) gets exactly that bound moved.

use crate::db::{BoundPredicate, DatabaseError, TreeTransaction};
use crate::models::{CoordinateColumn, Scope};

/// Rows touched by one shift, per bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftReport {
    pub lft_rows: u64,
    pub rgt_rows: u64,
}

pub struct RangeShifter;

impl RangeShifter {
    /// Add `step` to every `lft` and every `rgt` lying in `[lo, hi]`
    ///
    /// An empty window (`lo > hi`) or a zero step is a no-op.
    pub async fn shift_window<T: TreeTransaction>(
        tx: &mut T,
        scope: &Scope,
        lo: i64,
        hi: i64,
        step: i64,
    ) -> Result<ShiftReport, DatabaseError> {
        if lo > hi || step == 0 {
            return Ok(ShiftReport::default());
        }

        tracing::debug!("Shifting bounds in [{}, {}] by {} ({})", lo, hi, step, scope);

        let window = BoundPredicate::Between(lo, hi);
        let lft_rows = tx
            .conditional_shift(scope, CoordinateColumn::Left, window, step)
            .await?;
        let rgt_rows = tx
            .conditional_shift(scope, CoordinateColumn::Right, window, step)
            .await?;

        Ok(ShiftReport { lft_rows, rgt_rows })
    }

    /// Open a gap of `width` starting at bound `at`
    ///
    /// Every `rgt >= at` and every `lft > at` moves right by `width`. Used
    /// when inserting a child whose left bound is its parent's current right
    /// bound: the parent's own `rgt` is pushed out to enclose the gap.
    pub async fn open_gap<T: TreeTransaction>(
        tx: &mut T,
        scope: &Scope,
        at: i64,
        width: i64,
    ) -> Result<ShiftReport, DatabaseError> {
        tracing::debug!("Opening gap of {} at {} ({})", width, at, scope);

        let rgt_rows = tx
            .conditional_shift(
                scope,
                CoordinateColumn::Right,
                BoundPredicate::AtLeast(at),
                width,
            )
            .await?;
        let lft_rows = tx
            .conditional_shift(
                scope,
                CoordinateColumn::Left,
                BoundPredicate::GreaterThan(at),
                width,
            )
            .await?;

        Ok(ShiftReport { lft_rows, rgt_rows })
    }
}

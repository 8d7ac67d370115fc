//! Nested-Set Operations
//!
//! The tree surgery itself. Everything here runs against a
//! `TreeTransaction` and never builds SQL.
//!
//! - [`RangeShifter`] - conditional bound shifts, the primitive everything reduces to
//! - [`Relocator`] - moves a whole subtree to a new position
//! - [`TreeMutator`] - the public Create and Move operations, one transaction each

pub mod error;
pub mod range_shifter;
pub mod relocator;
pub mod tree_mutator;

pub use error::TreeOperationError;
pub use range_shifter::{RangeShifter, ShiftReport};
pub use relocator::{RelocationPlan, Relocator};
pub use tree_mutator::TreeMutator;

//! Data Models
//!
//! This module contains the data structures shared by the store and the
//! tree operations:
//!
//! - `NodeDescriptor` - resolved coordinates of one stored node
//! - `TreeRecord` / `TreeNode` - caller-side record contract and a ready-made record
//! - `ColumnMap` - table and column bindings
//! - `MoveDirection` - symbolic move target and its absolute `Destination`

mod column_map;
mod direction;
mod node;

pub use column_map::{is_identifier, ColumnMap, ColumnMapError, CoordinateColumn};
pub use direction::{Destination, MoveDirection};
pub use node::{
    resolve_insert, resolve_key, MappingError, NodeDescriptor, Placement, RecordKey, Scope,
    ScopeValue, TreeNode, TreeRecord,
};

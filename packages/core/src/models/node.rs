//! Node Data Structures
//!
//! This module defines the resolved view of a nested-set row and the
//! statically-typed contract a caller implements to hand records to the
//! tree operations.
//!
//! # Architecture
//!
//! - **NodeDescriptor**: coordinates of one stored node (`id`, `parent_id`,
//!   `depth`, `lft`, `rgt`, `children_count`) plus the `Scope` it lives in
//! - **TreeRecord**: implemented by application types; exposes the id, the
//!   scope and any payload columns, and receives computed coordinates back
//! - **Scope**: partition key isolating independent forests in one table
//!
//! # Examples
//!
//! ```rust
//! use nestedset_core::models::{Scope, ScopeValue, TreeNode};
//! use serde_json::json;
//!
//! let node = TreeNode::new(Scope::keyed(5))
//!     .with_attribute("title", json!("Electronics"));
//! assert_eq!(node.scope, Scope::Keyed(ScopeValue::Integer(5)));
//! ```

use crate::models::column_map::{is_identifier, ColumnMap};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Errors raised when a record cannot be mapped onto the bound table
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Record has no id")]
    MissingId,

    #[error("Record has no value for scope column '{column}'")]
    MissingScope { column: String },

    #[error("Record carries scope {value} but no scope column is configured")]
    UnscopedTable { value: ScopeValue },

    #[error("Attribute '{column}' collides with a nested-set column")]
    ReservedColumn { column: String },

    #[error("Attribute '{column}' is invalid: {reason}")]
    InvalidAttribute { column: String, reason: String },
}

/// Value of a scope column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeValue {
    Integer(i64),
    Text(String),
}

impl fmt::Display for ScopeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeValue::Integer(v) => write!(f, "{}", v),
            ScopeValue::Text(v) => write!(f, "'{}'", v),
        }
    }
}

impl From<i64> for ScopeValue {
    fn from(value: i64) -> Self {
        ScopeValue::Integer(value)
    }
}

impl From<&str> for ScopeValue {
    fn from(value: &str) -> Self {
        ScopeValue::Text(value.to_string())
    }
}

impl From<String> for ScopeValue {
    fn from(value: String) -> Self {
        ScopeValue::Text(value)
    }
}

/// Partition a node belongs to
///
/// `Global` addresses the whole table (no scope column configured).
/// `Keyed` restricts every read and write to rows whose scope column equals
/// the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    #[default]
    Global,
    Keyed(ScopeValue),
}

impl Scope {
    pub fn keyed(value: impl Into<ScopeValue>) -> Self {
        Scope::Keyed(value.into())
    }

    pub fn value(&self) -> Option<&ScopeValue> {
        match self {
            Scope::Global => None,
            Scope::Keyed(value) => Some(value),
        }
    }

    /// Check that this scope can be addressed through `columns`
    pub fn check(&self, columns: &ColumnMap) -> Result<(), MappingError> {
        match (self, &columns.scope) {
            (Scope::Global, None) | (Scope::Keyed(_), Some(_)) => Ok(()),
            (Scope::Global, Some(column)) => Err(MappingError::MissingScope {
                column: column.clone(),
            }),
            (Scope::Keyed(value), None) => Err(MappingError::UnscopedTable {
                value: value.clone(),
            }),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Keyed(value) => write!(f, "scope={}", value),
        }
    }
}

/// Coordinates of one stored node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub depth: i64,
    pub lft: i64,
    pub rgt: i64,
    pub children_count: i64,
    pub scope: Scope,
}

impl NodeDescriptor {
    /// Size of the occupied interval (`rgt - lft + 1`)
    pub fn width(&self) -> i64 {
        self.rgt - self.lft + 1
    }

    /// Number of descendants implied by the bounds
    pub fn descendant_count(&self) -> i64 {
        (self.rgt - self.lft - 1) / 2
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether `other` lies within this node's interval (self included)
    pub fn contains(&self, other: &NodeDescriptor) -> bool {
        self.lft <= other.lft && other.rgt <= self.rgt
    }

    /// Whether `other` is a strict descendant of this node
    pub fn is_ancestor_of(&self, other: &NodeDescriptor) -> bool {
        self.lft < other.lft && other.rgt < self.rgt
    }
}

/// Coordinates computed for a node that is about to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Caller-chosen id; `None` lets the store assign one
    pub id: Option<i64>,
    pub parent_id: Option<i64>,
    pub depth: i64,
    pub lft: i64,
    pub rgt: i64,
}

impl Placement {
    /// Placement for a new root whose left bound follows `max_rgt`
    pub fn root(id: Option<i64>, max_rgt: Option<i64>) -> Self {
        let lft = max_rgt.map_or(1, |rgt| rgt + 1);
        Self {
            id,
            parent_id: None,
            depth: 0,
            lft,
            rgt: lft + 1,
        }
    }

    /// Placement for a new last child of `parent`
    pub fn last_child_of(id: Option<i64>, parent: &NodeDescriptor) -> Self {
        Self {
            id,
            parent_id: Some(parent.id),
            depth: parent.depth + 1,
            lft: parent.rgt,
            rgt: parent.rgt + 1,
        }
    }

    pub fn into_descriptor(self, id: i64, scope: Scope) -> NodeDescriptor {
        NodeDescriptor {
            id,
            parent_id: self.parent_id,
            depth: self.depth,
            lft: self.lft,
            rgt: self.rgt,
            children_count: 0,
            scope,
        }
    }
}

/// Application record stored in a nested-set table
///
/// Coordinates are never taken from the record: tree operations re-read
/// them from storage. The record only identifies itself, names its scope,
/// supplies payload columns for inserts, and receives the coordinates a
/// `create` computed.
pub trait TreeRecord: Send + Sync {
    /// Id of the stored row (`None` for a record that was never inserted)
    fn record_id(&self) -> Option<i64>;

    fn scope(&self) -> Scope {
        Scope::Global
    }

    /// Non-coordinate columns written alongside a new node
    fn attributes(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Receive the coordinates stored for this record
    fn assign(&mut self, _placed: &NodeDescriptor) {}
}

/// Identity of a record resolved against a `ColumnMap`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKey {
    pub id: i64,
    pub scope: Scope,
}

/// Resolve the id and scope of a stored record
pub fn resolve_key<R: TreeRecord + ?Sized>(
    record: &R,
    columns: &ColumnMap,
) -> Result<RecordKey, MappingError> {
    let scope = record.scope();
    scope.check(columns)?;
    let id = record.record_id().ok_or(MappingError::MissingId)?;
    Ok(RecordKey { id, scope })
}

/// Resolve the scope and payload of a record about to be inserted
pub fn resolve_insert<R: TreeRecord + ?Sized>(
    record: &R,
    columns: &ColumnMap,
) -> Result<(Scope, Map<String, Value>), MappingError> {
    let scope = record.scope();
    scope.check(columns)?;

    let attributes = record.attributes();
    for (column, value) in &attributes {
        if !is_identifier(column) {
            return Err(MappingError::InvalidAttribute {
                column: column.clone(),
                reason: "not a SQL identifier".to_string(),
            });
        }
        if columns.is_reserved(column) {
            return Err(MappingError::ReservedColumn {
                column: column.clone(),
            });
        }
        if value.is_array() || value.is_object() {
            return Err(MappingError::InvalidAttribute {
                column: column.clone(),
                reason: "only scalar values can be stored".to_string(),
            });
        }
    }

    Ok((scope, attributes))
}

/// General-purpose record for tables with free-form payload columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: Option<i64>,
    #[serde(default)]
    pub scope: Scope,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub depth: i64,
    #[serde(default)]
    pub lft: i64,
    #[serde(default)]
    pub rgt: i64,
    #[serde(default)]
    pub children_count: i64,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl TreeNode {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    /// Record pointing at an already stored row
    pub fn with_id(id: i64, scope: Scope) -> Self {
        Self {
            id: Some(id),
            scope,
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, column: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(column.into(), value);
        self
    }
}

impl From<&NodeDescriptor> for TreeNode {
    fn from(node: &NodeDescriptor) -> Self {
        Self {
            id: Some(node.id),
            scope: node.scope.clone(),
            parent_id: node.parent_id,
            depth: node.depth,
            lft: node.lft,
            rgt: node.rgt,
            children_count: node.children_count,
            attributes: Map::new(),
        }
    }
}

impl TreeRecord for TreeNode {
    fn record_id(&self) -> Option<i64> {
        self.id
    }

    fn scope(&self) -> Scope {
        self.scope.clone()
    }

    fn attributes(&self) -> Map<String, Value> {
        self.attributes.clone()
    }

    fn assign(&mut self, placed: &NodeDescriptor) {
        self.id = Some(placed.id);
        self.parent_id = placed.parent_id;
        self.depth = placed.depth;
        self.lft = placed.lft;
        self.rgt = placed.rgt;
        self.children_count = placed.children_count;
    }
}

impl TreeRecord for NodeDescriptor {
    fn record_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn scope(&self) -> Scope {
        self.scope.clone()
    }
}

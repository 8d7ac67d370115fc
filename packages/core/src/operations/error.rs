//! Error types for tree operations
//!
//! This module defines all error types that can occur while creating or
//! moving nodes, providing clear messages for mapping failures, store
//! failures and rejected moves.

use crate::db::DatabaseError;
use crate::models::{MappingError, Scope};
use thiserror::Error;

/// Errors that can occur during tree operations
///
/// Any error returned from `create` or `move_to` means the enclosing
/// transaction was rolled back: no coordinate changed.
///
/// # Examples
///
/// ```rust
/// use nestedset_core::operations::TreeOperationError;
///
/// let err = TreeOperationError::node_not_found(42);
/// assert_eq!(err.to_string(), "Node 42 does not exist");
/// ```
#[derive(Error, Debug)]
pub enum TreeOperationError {
    /// The record could not be mapped onto the bound table
    ///
    /// Raised before any store interaction.
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// The store failed during a read or write
    #[error("Store error: {0}")]
    Store(#[from] DatabaseError),

    /// Referenced node does not exist in the addressed scope
    #[error("Node {id} does not exist")]
    NodeNotFound { id: i64 },

    /// Node and reference live in different scopes
    #[error("Node {node_id} ({node_scope}) and node {reference_id} ({reference_scope}) are in different scopes")]
    ScopeMismatch {
        node_id: i64,
        node_scope: Scope,
        reference_id: i64,
        reference_scope: Scope,
    },

    /// A new node and its parent live in different scopes
    #[error("Parent {parent_id} ({parent_scope}) is not in the new node's scope ({scope})")]
    ParentScopeMismatch {
        parent_id: i64,
        parent_scope: Scope,
        scope: Scope,
    },

    /// The requested move would break the tree
    ///
    /// Moving a node relative to itself or to one of its own descendants.
    #[error("Cannot move node {node_id} relative to node {reference_id}: {reason}")]
    InvalidMove {
        node_id: i64,
        reference_id: i64,
        reason: String,
    },
}

impl TreeOperationError {
    /// Create a NodeNotFound error
    pub fn node_not_found(id: i64) -> Self {
        Self::NodeNotFound { id }
    }

    /// Create a ScopeMismatch error
    pub fn scope_mismatch(
        node_id: i64,
        node_scope: Scope,
        reference_id: i64,
        reference_scope: Scope,
    ) -> Self {
        Self::ScopeMismatch {
            node_id,
            node_scope,
            reference_id,
            reference_scope,
        }
    }

    /// Create a ParentScopeMismatch error
    pub fn parent_scope_mismatch(parent_id: i64, parent_scope: Scope, scope: Scope) -> Self {
        Self::ParentScopeMismatch {
            parent_id,
            parent_scope,
            scope,
        }
    }

    /// Create an InvalidMove error
    pub fn invalid_move(node_id: i64, reference_id: i64, reason: impl Into<String>) -> Self {
        Self::InvalidMove {
            node_id,
            reference_id,
            reason: reason.into(),
        }
    }
}

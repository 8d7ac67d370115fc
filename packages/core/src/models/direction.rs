//! Move Directions
//!
//! Maps a symbolic direction relative to a reference node onto the absolute
//! destination the relocator works with. Keeping this a pure function keeps
//! the relocator itself direction-agnostic.

use crate::models::NodeDescriptor;
use serde::{Deserialize, Serialize};

/// Where a moved node ends up relative to the reference node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    /// `[node][reference]`: node becomes the reference's left sibling
    Before,
    /// `[reference][node]`: node becomes the reference's right sibling
    After,
    /// `[reference [node ...]]`: node becomes the reference's first child
    Inner,
}

/// Absolute destination of a move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub new_parent_id: Option<i64>,
    pub depth_change: i64,
    /// The moved subtree's interval starts right after this bound
    pub position: i64,
}

impl MoveDirection {
    /// Resolve the destination of `node` relative to `reference`
    ///
    /// Both descriptors must be fresh reads from the same snapshot.
    pub fn destination(self, node: &NodeDescriptor, reference: &NodeDescriptor) -> Destination {
        match self {
            MoveDirection::Before => Destination {
                new_parent_id: reference.parent_id,
                depth_change: reference.depth - node.depth,
                position: reference.lft - 1,
            },
            MoveDirection::After => Destination {
                new_parent_id: reference.parent_id,
                depth_change: reference.depth - node.depth,
                position: reference.rgt,
            },
            MoveDirection::Inner => Destination {
                new_parent_id: Some(reference.id),
                depth_change: reference.depth + 1 - node.depth,
                position: reference.lft,
            },
        }
    }
}

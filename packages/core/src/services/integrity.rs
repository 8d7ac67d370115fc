//! Nested-set integrity checking
//!
//! Verifies one scope's snapshot against the nested-set invariants:
//!
//! - `lft < rgt` for every node
//! - bounds are unique and cover exactly `1..=2n`
//! - intervals are disjoint or nested, and the innermost enclosing interval
//!   belongs to the node's parent
//! - `rgt - lft == 2 * descendants + 1`
//! - depth is the parent's depth plus one (zero for roots)
//! - `children_count` matches the number of rows naming the node as parent
//!
//! The checker is a pure function over `list_nodes` output, so it can be run
//! on any snapshot regardless of where it came from.

use crate::models::NodeDescriptor;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// One broken invariant
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
    #[error("Node {id} has lft {lft} >= rgt {rgt}")]
    InvalidBounds { id: i64, lft: i64, rgt: i64 },

    #[error("Bound {bound} is used by node {first} and node {second}")]
    DuplicateBound { bound: i64, first: i64, second: i64 },

    #[error("Bound {bound} is not used by any node")]
    MissingBound { bound: i64 },

    #[error("Node {id} uses bound {bound} outside 1..={max}")]
    BoundOutOfRange { id: i64, bound: i64, max: i64 },

    #[error("Intervals of node {first} and node {second} partially overlap")]
    PartialOverlap { first: i64, second: i64 },

    #[error("Node {id} spans ({lft}, {rgt}) but has {descendants} descendants")]
    WidthMismatch {
        id: i64,
        lft: i64,
        rgt: i64,
        descendants: i64,
    },

    #[error("Node {id} names missing parent {parent_id}")]
    MissingParent { id: i64, parent_id: i64 },

    #[error("Node {id} has parent {parent_id:?} but lies directly inside {enclosing:?}")]
    ParentMismatch {
        id: i64,
        parent_id: Option<i64>,
        enclosing: Option<i64>,
    },

    #[error("Node {id} has depth {depth}, expected {expected}")]
    DepthMismatch { id: i64, depth: i64, expected: i64 },

    #[error("Node {id} stores children_count {stored}, actual {actual}")]
    ChildrenCountMismatch { id: i64, stored: i64, actual: i64 },
}

/// Check every invariant over the nodes of one scope
///
/// An empty result means the scope is consistent.
pub fn check_integrity(nodes: &[NodeDescriptor]) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();

    let mut ordered: Vec<&NodeDescriptor> = nodes.iter().collect();
    ordered.sort_by_key(|node| (node.lft, node.id));

    check_bounds(&ordered, &mut violations);

    let mut enclosing: HashMap<i64, Option<i64>> = HashMap::new();
    let mut descendants: HashMap<i64, i64> = HashMap::new();
    let mut stack: Vec<&NodeDescriptor> = Vec::new();

    for &node in ordered.iter().filter(|node| node.lft < node.rgt) {
        while stack.last().is_some_and(|top| top.rgt < node.lft) {
            stack.pop();
        }
        if let Some(top) = stack.last() {
            if top.rgt < node.rgt {
                violations.push(IntegrityViolation::PartialOverlap {
                    first: top.id,
                    second: node.id,
                });
            }
        }

        let mut innermost = None;
        for ancestor in stack.iter().filter(|s| s.lft < node.lft && node.rgt < s.rgt) {
            *descendants.entry(ancestor.id).or_default() += 1;
            innermost = Some(ancestor.id);
        }
        enclosing.insert(node.id, innermost);
        stack.push(node);
    }

    let by_id: HashMap<i64, &NodeDescriptor> = nodes.iter().map(|node| (node.id, node)).collect();
    let mut children: HashMap<i64, i64> = HashMap::new();
    for parent_id in nodes.iter().filter_map(|node| node.parent_id) {
        *children.entry(parent_id).or_default() += 1;
    }

    for &node in &ordered {
        if node.lft < node.rgt {
            let count = descendants.get(&node.id).copied().unwrap_or(0);
            if node.rgt - node.lft != 2 * count + 1 {
                violations.push(IntegrityViolation::WidthMismatch {
                    id: node.id,
                    lft: node.lft,
                    rgt: node.rgt,
                    descendants: count,
                });
            }

            let inside = enclosing.get(&node.id).copied().flatten();
            let parent_known = node.parent_id.map_or(true, |p| by_id.contains_key(&p));
            if parent_known && inside != node.parent_id {
                violations.push(IntegrityViolation::ParentMismatch {
                    id: node.id,
                    parent_id: node.parent_id,
                    enclosing: inside,
                });
            }
        }

        let expected_depth = match node.parent_id {
            None => Some(0),
            Some(parent_id) => match by_id.get(&parent_id) {
                Some(parent) => Some(parent.depth + 1),
                None => {
                    violations.push(IntegrityViolation::MissingParent {
                        id: node.id,
                        parent_id,
                    });
                    None
                }
            },
        };
        if let Some(expected) = expected_depth {
            if node.depth != expected {
                violations.push(IntegrityViolation::DepthMismatch {
                    id: node.id,
                    depth: node.depth,
                    expected,
                });
            }
        }

        let actual = children.get(&node.id).copied().unwrap_or(0);
        if node.children_count != actual {
            violations.push(IntegrityViolation::ChildrenCountMismatch {
                id: node.id,
                stored: node.children_count,
                actual,
            });
        }
    }

    violations
}

fn check_bounds(ordered: &[&NodeDescriptor], violations: &mut Vec<IntegrityViolation>) {
    let max = 2 * ordered.len() as i64;
    let mut owners: BTreeMap<i64, i64> = BTreeMap::new();

    for node in ordered {
        if node.lft >= node.rgt {
            violations.push(IntegrityViolation::InvalidBounds {
                id: node.id,
                lft: node.lft,
                rgt: node.rgt,
            });
        }
        for bound in [node.lft, node.rgt] {
            match owners.get(&bound) {
                Some(&first) => violations.push(IntegrityViolation::DuplicateBound {
                    bound,
                    first,
                    second: node.id,
                }),
                None => {
                    owners.insert(bound, node.id);
                }
            }
        }
    }

    for (&bound, &id) in &owners {
        if bound < 1 || bound > max {
            violations.push(IntegrityViolation::BoundOutOfRange { id, bound, max });
        }
    }
    for bound in (1..=max).filter(|bound| !owners.contains_key(bound)) {
        violations.push(IntegrityViolation::MissingBound { bound });
    }
}

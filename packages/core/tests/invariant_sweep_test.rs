//! Randomized Create/Move sequences
//!
//! Drives seeded pseudo-random operation sequences and checks after every
//! step that:
//! - the integrity checker finds nothing
//! - invalid moves (self, own subtree) are rejected without changes
//! - repeating a successful move changes nothing

mod common;

use anyhow::Result;
use common::{create_test_env, snapshot};
use nestedset_core::{
    MemoryStore, MoveDirection, NestedSetService, NodeDescriptor, Scope, TreeNode,
    TreeOperationError, TreeStore,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIRECTIONS: [MoveDirection; 3] = [
    MoveDirection::Before,
    MoveDirection::After,
    MoveDirection::Inner,
];

async fn run_sequence<S: TreeStore>(
    service: &NestedSetService<S>,
    scope: &Scope,
    seed: u64,
    steps: usize,
) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    service.create_root(&mut TreeNode::new(scope.clone())).await?;

    for step in 0..steps {
        let nodes: Vec<NodeDescriptor> = service.list_nodes(scope).await?;

        if nodes.len() < 3 || rng.gen_bool(0.35) {
            let mut record = TreeNode::new(scope.clone());
            if rng.gen_bool(0.15) {
                service.create_root(&mut record).await?;
            } else {
                let parent = &nodes[rng.gen_range(0..nodes.len())];
                service.create_child(&mut record, parent).await?;
            }
        } else {
            let node = &nodes[rng.gen_range(0..nodes.len())];
            let reference = &nodes[rng.gen_range(0..nodes.len())];
            let direction = DIRECTIONS[rng.gen_range(0..DIRECTIONS.len())];

            let result = service.move_to(node, reference, direction).await;
            if node.contains(reference) {
                assert!(
                    matches!(result, Err(TreeOperationError::InvalidMove { .. })),
                    "seed {} step {}: move of {} {:?} {} should be rejected",
                    seed,
                    step,
                    node.id,
                    direction,
                    reference.id
                );
                assert_eq!(snapshot(service, scope).await?, {
                    let mut sorted = nodes.clone();
                    sorted.sort_by_key(|n| n.id);
                    sorted
                });
                continue;
            }
            result?;

            let after_first = snapshot(service, scope).await?;
            service.move_to(node, reference, direction).await?;
            assert_eq!(
                snapshot(service, scope).await?,
                after_first,
                "seed {} step {}: repeated {:?} move changed the tree",
                seed,
                step,
                direction
            );
        }

        let violations = service.check_integrity(scope).await?;
        assert!(
            violations.is_empty(),
            "seed {} step {}: {:?}",
            seed,
            step,
            violations
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_random_sequences_in_memory() -> Result<()> {
    for seed in 0..16 {
        let service = NestedSetService::new(MemoryStore::default());
        run_sequence(&service, &Scope::Global, seed, 150).await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_random_sequences_in_scoped_memory() -> Result<()> {
    let service = NestedSetService::new(MemoryStore::scoped("tree_id"));
    for seed in 0..4 {
        run_sequence(&service, &Scope::keyed(seed as i64), seed, 80).await?;
    }
    for seed in 0..4 {
        let violations = service.check_integrity(&Scope::keyed(seed as i64)).await?;
        assert!(violations.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn test_random_sequence_on_libsql() -> Result<()> {
    let (service, _temp_dir) = create_test_env().await?;
    run_sequence(&service, &Scope::Global, 42, 60).await
}

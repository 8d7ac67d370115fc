//! Performance benchmarks for nested-set operations
//!
//! Run with: `cargo bench -p nestedset-core`
//!
//! These benchmarks measure critical path performance:
//! - Child creation under a growing parent (gap opening cost)
//! - Subtree moves across a populated tree (window shift + subtree offset)
//! - The same operations against the in-memory store, as a baseline

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nestedset_core::{
    MemoryStore, MoveDirection, NestedSetConfig, NestedSetService, NodeDescriptor, TreeNode,
    TreeStore, TursoStore,
};
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Setup a service over a fresh database file
async fn setup_turso_service() -> (NestedSetService<TursoStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = NestedSetConfig::new(temp_dir.path().join("bench.db"));
    let service = NestedSetService::open(&config).await.unwrap();
    (service, temp_dir)
}

/// Root with `width` children, each holding `depth` nested descendants
async fn populate<S: TreeStore>(
    service: &NestedSetService<S>,
    width: usize,
    depth: usize,
) -> Vec<NodeDescriptor> {
    let root = service.create_root(&mut TreeNode::default()).await.unwrap();
    let mut branches = Vec::with_capacity(width);
    for _ in 0..width {
        let branch = service
            .create_child(&mut TreeNode::default(), &root)
            .await
            .unwrap();
        let mut tip = branch.clone();
        for _ in 0..depth {
            tip = service
                .create_child(&mut TreeNode::default(), &tip)
                .await
                .unwrap();
        }
        branches.push(branch);
    }
    branches
}

/// Benchmark appending children to one parent
///
/// Every insert shifts the parent's right bound and everything after it.
fn bench_create(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("create_child_turso", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_turso_service().await;
                let parent = service.create_root(&mut TreeNode::default()).await.unwrap();

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    let child = service
                        .create_child(&mut TreeNode::default(), &parent)
                        .await
                        .unwrap();
                    black_box(child);
                }
                start.elapsed()
            })
        });
    });

    c.bench_function("create_child_memory", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let service = NestedSetService::new(MemoryStore::default());
                let parent = service.create_root(&mut TreeNode::default()).await.unwrap();

                let start = std::time::Instant::now();
                for _ in 0..iters {
                    let child = service
                        .create_child(&mut TreeNode::default(), &parent)
                        .await
                        .unwrap();
                    black_box(child);
                }
                start.elapsed()
            })
        });
    });
}

/// Benchmark moving a subtree back and forth across its siblings
///
/// Alternates between first and last position so every iteration does real
/// work instead of resolving to a no-op.
fn bench_move(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("move_subtree");
    group.sample_size(20); // Fewer samples for expensive operations

    group.bench_function("turso_50x5", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let (service, _temp) = setup_turso_service().await;
                let branches = populate(&service, 50, 5).await;
                let (first, last) = (&branches[0], &branches[branches.len() - 1]);

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let moved = if i % 2 == 0 {
                        service.move_to(first, last, MoveDirection::After).await
                    } else {
                        service.move_to(first, last, MoveDirection::Before).await
                    };
                    black_box(moved.unwrap());
                }
                start.elapsed()
            })
        });
    });

    group.bench_function("memory_50x5", |b| {
        b.iter_custom(|iters| {
            rt.block_on(async {
                let service = NestedSetService::new(MemoryStore::default());
                let branches = populate(&service, 50, 5).await;
                let (first, last) = (&branches[0], &branches[branches.len() - 1]);

                let start = std::time::Instant::now();
                for i in 0..iters {
                    let moved = if i % 2 == 0 {
                        service.move_to(first, last, MoveDirection::After).await
                    } else {
                        service.move_to(first, last, MoveDirection::Before).await
                    };
                    black_box(moved.unwrap());
                }
                start.elapsed()
            })
        });
    });

    group.finish();
}

criterion_group!(benches, bench_create, bench_move);
criterion_main!(benches);

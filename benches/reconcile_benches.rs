use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rustc_hash::FxHashMap;

use eucalypt_reconcile::options::{CostVector, ReconciliationOptions, Task};
use eucalypt_reconcile::strategy::{all, per_class};
use eucalypt_reconcile::tree::{NodeId, Tree, TreeBuilder};
use eucalypt_reconcile::utils::cancellation::CancellationToken;

/// Eight parasite leaves over eight host leaves, both balanced binary trees,
/// with every parasite leaf mapped to the same handful of host leaves its
/// cherry-mates use — forces enough duplication/host-switch/loss ties that
/// `all` and `per_class` each do real work instead of returning instantly.
fn eight_leaf_fixture() -> (Tree, Tree, FxHashMap<NodeId, NodeId>) {
    let mut pb = TreeBuilder::new();
    let p_leaves: Vec<NodeId> = (0..8).map(|i| pb.leaf(format!("p{i}"))).collect();
    let mut p_level = p_leaves.clone();
    let mut counter = 0;
    while p_level.len() > 1 {
        let mut next = Vec::new();
        for pair in p_level.chunks(2) {
            let label = format!("pn{counter}");
            counter += 1;
            next.push(pb.internal(label, pair[0], pair[1]));
        }
        p_level = next;
    }
    let parasite = pb.build(p_level[0]).unwrap();

    let mut hb = TreeBuilder::new();
    let h_leaves: Vec<NodeId> = (0..8).map(|i| hb.leaf(format!("h{i}"))).collect();
    let mut h_level = h_leaves.clone();
    let mut counter = 0;
    while h_level.len() > 1 {
        let mut next = Vec::new();
        for pair in h_level.chunks(2) {
            let label = format!("hn{counter}");
            counter += 1;
            next.push(hb.internal(label, pair[0], pair[1]));
        }
        h_level = next;
    }
    let host = hb.build(h_level[0]).unwrap();

    let mut leaf_map = FxHashMap::default();
    for (i, &p) in p_leaves.iter().enumerate() {
        leaf_map.insert(p, h_leaves[i % 4]);
    }
    (parasite, host, leaf_map)
}

fn options(task: Task) -> ReconciliationOptions {
    ReconciliationOptions {
        cost: CostVector {
            cospeciation: -1,
            duplication: 1,
            host_switch: 1,
            loss: 1,
        },
        task,
        ..ReconciliationOptions::default()
    }
}

fn reconcile_pipeline(c: &mut Criterion) {
    let (parasite, host, leaf_map) = eight_leaf_fixture();

    c.bench_function("all_solutions", |b| {
        b.iter(|| {
            let cancellation = CancellationToken::new();
            let result = all(
                black_box(&host),
                black_box(&parasite),
                black_box(&leaf_map),
                black_box(&options(Task::AllSolutions)),
                &cancellation,
            )
            .expect("reconciliation failed during benchmark");
            black_box(result);
        })
    });

    c.bench_function("event_partition_classes", |b| {
        b.iter(|| {
            let cancellation = CancellationToken::new();
            let result = per_class(
                black_box(&host),
                black_box(&parasite),
                black_box(&leaf_map),
                black_box(&options(Task::EventPartition)),
                &cancellation,
            )
            .expect("class build failed during benchmark");
            black_box(result);
        })
    });
}

fn all_benchmarks(c: &mut Criterion) {
    reconcile_pipeline(c);
}

criterion_group!(benches, all_benchmarks);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use taskmap::domain::graph::GraphStore;
use taskmap::domain::task::{TaskId, TaskNode};
use taskmap::services::layout::{LayeredLayout, LayoutConfig, LayoutEngine};

/// `chains` parallel chains of `length` tasks, each task also depending on
/// the one two steps back in the neighbouring chain.
fn build_graph(chains: usize, length: usize) -> GraphStore {
    let mut store = GraphStore::new();
    let id = |c: usize, i: usize| TaskId::new(format!("{}-{}", c, i));

    for c in 0..chains {
        for i in 0..length {
            store
                .add_node(TaskNode::new(id(c, i), format!("Task {} of chain {}", i, c)))
                .expect("unique id");
        }
    }
    for c in 0..chains {
        for i in 1..length {
            store.add_edge(&id(c, i - 1), &id(c, i)).expect("acyclic");
            if i >= 2 && c + 1 < chains {
                store.add_edge(&id(c + 1, i - 2), &id(c, i)).expect("acyclic");
            }
        }
    }
    store
}

fn benchmark_layered_layout(c: &mut Criterion) {
    let engine = LayeredLayout::new(LayoutConfig::default());
    let mut group = c.benchmark_group("layered_layout");

    for &(chains, length) in &[(5, 10), (10, 20), (20, 25)] {
        let store = build_graph(chains, length);
        group.bench_with_input(
            BenchmarkId::from_parameter(chains * length),
            &store,
            |b, store| b.iter(|| engine.layout(black_box(store))),
        );
    }
    group.finish();
}

fn benchmark_cycle_check(c: &mut Criterion) {
    let store = build_graph(20, 25);
    let first = TaskId::from("0-0");
    let last = TaskId::from("0-24");

    c.bench_function("check_edge_rejects_cycle", |b| {
        b.iter(|| store.check_edge(black_box(&last), black_box(&first)).is_err())
    });
}

criterion_group!(benches, benchmark_layered_layout, benchmark_cycle_check);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shut_core::{Task, TaskGraph};

fn generate_graph(groups: usize, tasks_per_group: usize, deps_per_task: usize) -> TaskGraph {
    let mut graph = TaskGraph::new();
    let mut keys = Vec::with_capacity(groups * tasks_per_group);

    for g in 0..groups {
        let group = graph.create_group(&format!("group-{}", g), None).unwrap();
        for t in 0..tasks_per_group {
            let key = graph
                .group_mut(group)
                .unwrap()
                .add_task(Task::noop(format!("task-{}", t)))
                .unwrap();
            let dep_count = deps_per_task.min(keys.len());
            for j in 0..dep_count {
                graph.add_edge(keys[keys.len() - 1 - j], key).unwrap();
            }
            keys.push(key);
        }
    }

    graph
}

fn benchmark_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordered_tasks");

    for count in [10, 50, 100, 500] {
        let graph = generate_graph(count, 10, 3);
        group.bench_function(format!("{}_tasks", count * 10), |b| {
            b.iter(|| black_box(graph.ordered_tasks().unwrap()))
        });
    }

    group.finish();
}

fn benchmark_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordered_selection");

    for count in [10, 50, 100, 500] {
        let graph = generate_graph(count, 10, 3);
        let selection = [format!("group-{}", count / 2)];
        group.bench_function(format!("{}_tasks", count * 10), |b| {
            b.iter(|| black_box(graph.ordered_selection(&selection).unwrap()))
        });
    }

    group.finish();
}

fn benchmark_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_construction");

    for count in [10, 100, 500] {
        group.bench_function(format!("{}_tasks", count * 10), |b| {
            b.iter(|| black_box(generate_graph(count, 10, 3)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_ordering,
    benchmark_selection,
    benchmark_construction
);
criterion_main!(benches);

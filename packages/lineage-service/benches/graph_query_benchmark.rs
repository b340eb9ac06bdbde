//! Benchmark for lineage graph traversal
//!
//! Measures:
//! - Downstream BFS over layered graphs of growing width
//! - Shortest path across the full depth
//! - Edge derivation for a wide batch

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lineage_service::lineage_storage::{
    DatasetIdentifier, EventSource, EventType, InMemoryLineageStore, LineageEdge, LineageEvent,
    LineageStore,
};
use lineage_service::{derive_edges, LineageConfig, LineageService};
use std::sync::Arc;
use tokio::runtime::Runtime;

const LAYERS: usize = 6;

fn node(layer: usize, index: usize) -> DatasetIdentifier {
    DatasetIdentifier::table(format!("layer{}", layer), format!("t{}", index))
        .expect("benchmark identifiers are valid")
}

/// Every node links to two nodes of the next layer
fn layered_edges(width: usize) -> Vec<LineageEdge> {
    let mut edges = Vec::new();
    for layer in 0..LAYERS - 1 {
        for i in 0..width {
            edges.push(LineageEdge::new(node(layer, i), node(layer + 1, i)));
            edges.push(LineageEdge::new(node(layer, i), node(layer + 1, (i + 1) % width)));
        }
    }
    edges
}

fn service_for(rt: &Runtime, width: usize) -> LineageService {
    let store = InMemoryLineageStore::new();
    rt.block_on(store.upsert_edges(&layered_edges(width)))
        .expect("seeding the in-memory store");

    let mut config = LineageConfig::default();
    config.max_depth_limit = LAYERS;
    config.default_max_depth = LAYERS;
    LineageService::new(Arc::new(store), config).expect("valid benchmark config")
}

fn bench_downstream(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let mut group = c.benchmark_group("downstream_bfs");

    for width in [10, 50, 200] {
        let service = service_for(&rt, width);
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.to_async(&rt).iter(|| async {
                let nodes = service.get_downstream("layer0", "t0", None).await;
                black_box(nodes)
            });
        });
    }

    group.finish();
}

fn bench_path(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");
    let service = service_for(&rt, 50);

    c.bench_function("shortest_path_full_depth", |b| {
        b.to_async(&rt).iter(|| async {
            let path = service
                .get_path("layer0", "t0", &format!("layer{}", LAYERS - 1), "t5", None)
                .await;
            black_box(path)
        });
    });
}

fn bench_derive(c: &mut Criterion) {
    let events: Vec<LineageEvent> = (0..100)
        .map(|i| {
            LineageEvent::builder(EventType::JobCompleted, EventSource::Etl)
                .inputs((0..5).map(|j| node(0, i * 5 + j)))
                .outputs((0..3).map(|j| node(1, (i + j) % 120)))
                .build()
        })
        .collect();

    c.bench_function("derive_edges_100_events", |b| {
        b.iter(|| black_box(derive_edges(black_box(&events))))
    });
}

criterion_group!(benches, bench_downstream, bench_path, bench_derive);
criterion_main!(benches);

//! Benchmarks for feature-set serialization.
//!
//! Run with: `cargo bench --package stylescript_runtime`

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use stylescript_foundation::{Feature, GeometryType};
use stylescript_runtime::{FeatureSet, serialize};

fn feature_set(n: usize) -> FeatureSet {
    (0..n)
        .map(|i| {
            Feature::new(i as u64)
                .with_geometry(GeometryType::Lines)
                .with_prop("kind", "residential")
                .with_prop("lanes", (i % 4) as i32 + 1)
                .with_prop("name", format!("street {i}"))
        })
        .collect()
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    for n in [100, 10_000] {
        let set = feature_set(n);
        let bytes = serialize::to_bytes(&set).unwrap_or_default();
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("to_bytes", n), &set, |b, set| {
            b.iter(|| black_box(serialize::to_bytes(black_box(set))));
        });
        group.bench_with_input(BenchmarkId::new("from_bytes", n), &bytes, |b, bytes| {
            b.iter(|| black_box(serialize::from_bytes(black_box(bytes))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_serialization);
criterion_main!(benches);

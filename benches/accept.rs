//! Frame-acceptance throughput.
//!
//! Exercises the copy-on-mutate path end to end: open a transient frame,
//! create or mutate some objects, validate, and commit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use objectgraph::{Design, Metamodel, SimpleMetamodel, StructuralKind};

fn metamodel() -> Arc<dyn Metamodel> {
    Arc::new(
        SimpleMetamodel::new()
            .register_type("Note", StructuralKind::Unstructured, vec![])
            .register_type("Box", StructuralKind::Node, vec![]),
    )
}

fn bench_create_and_accept(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_and_accept");
    group.sample_size(30);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(3));

    for object_count in [10usize, 100, 1_000].iter() {
        group.bench_with_input(
            BenchmarkId::new("objects", object_count),
            object_count,
            |b, &count| {
                let design = Design::new(metamodel());
                b.iter(|| {
                    let mut frame = design.create_frame();
                    for _ in 0..count {
                        frame.create("Note", None, HashMap::new()).unwrap();
                    }
                    design.accept(frame).unwrap();
                })
            },
        );
    }
    group.finish();
}

fn bench_accept_with_unchanged_objects(c: &mut Criterion) {
    let mut group = c.benchmark_group("accept_with_unchanged_objects");
    group.sample_size(30);

    for base_size in [100usize, 1_000, 10_000].iter() {
        group.bench_with_input(
            BenchmarkId::new("base_objects", base_size),
            base_size,
            |b, &count| {
                let design = Design::new(metamodel());
                let mut seed = design.create_frame();
                let mut ids = Vec::with_capacity(count);
                for _ in 0..count {
                    ids.push(seed.create("Box", None, HashMap::new()).unwrap());
                }
                design.accept(seed).unwrap();

                b.iter(|| {
                    let mut frame = design.create_frame();
                    frame.mutate(ids[0]).unwrap();
                    design.accept(frame).unwrap();
                })
            },
        );
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .sample_size(30)
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(3));
    targets = bench_create_and_accept, bench_accept_with_unchanged_objects
);
criterion_main!(benches);

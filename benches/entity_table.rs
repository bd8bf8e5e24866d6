//! Raw [`EntityTable`] operations, independent of the design/frame layer
//! built on top of it.

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use objectgraph::entity_table::{EntityTable, Identified};
use rand::Rng;

#[derive(Clone)]
struct Row(u64);

impl Identified for Row {
    type Id = u64;
    fn id(&self) -> u64 {
        self.0
    }
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_table_insert");
    for count in [1_000usize, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("rows", count), count, |b, &count| {
            b.iter(|| {
                let mut table: EntityTable<Row> = EntityTable::with_capacity(count);
                for i in 0..count as u64 {
                    table.insert(Row(i)).unwrap();
                }
                black_box(table.len())
            })
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_table_lookup");
    for count in [1_000usize, 10_000, 100_000].iter() {
        let mut table: EntityTable<Row> = EntityTable::with_capacity(*count);
        for i in 0..*count as u64 {
            table.insert(Row(i)).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("rows", count), count, |b, &count| {
            b.iter(|| {
                for i in 0..count as u64 {
                    black_box(table.lookup(i));
                }
            })
        });
    }
    group.finish();
}

fn bench_random_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_table_random_lookup");
    let count = 100_000u64;
    let mut table: EntityTable<Row> = EntityTable::with_capacity(count as usize);
    for i in 0..count {
        table.insert(Row(i)).unwrap();
    }
    let mut rng = rand::thread_rng();
    group.bench_function("rows_100000", |b| {
        b.iter(|| {
            let idx = rng.gen_range(0..count);
            black_box(table.lookup(idx));
        })
    });
    group.finish();
}

fn bench_release_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_table_release_churn");
    group.sample_size(30);
    group.bench_function("insert_then_release_10k", |b| {
        b.iter(|| {
            let mut table: EntityTable<Row> = EntityTable::new();
            for i in 0..10_000u64 {
                table.insert(Row(i)).unwrap();
            }
            for i in 0..10_000u64 {
                table.release(i);
            }
            black_box(table.len())
        })
    });
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default()
        .sample_size(30)
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(3));
    targets = bench_insert, bench_lookup, bench_random_lookup, bench_release_churn
);
criterion_main!(benches);

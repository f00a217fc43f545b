//! Benchmarks for Prolly Tree operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use prolly_blockstore::{BlockStore, MemoryBlockStore};
use prolly_core::prolly::map::{MapSchema, ProllyMap};
use prolly_core::prolly::{Entry, ProllyConfig, ProllyTree};
use prolly_core::Mutation;
use std::sync::Arc;

fn entries(size: usize) -> Vec<(String, u64)> {
    (0..size).map(|i| (format!("key-{:08}", i), i as u64)).collect()
}

fn bench_create(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let config = ProllyConfig::default();

    let mut group = c.benchmark_group("prolly_create");

    for size in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let items: Vec<_> = entries(size).into_iter().map(Entry::from).collect();
            b.iter(|| {
                rt.block_on(async {
                    let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
                    let ctx = config.context(MapSchema::<String, u64>::new(), store).unwrap();
                    let (tree, blocks) = ProllyTree::create(ctx, items.clone()).await.unwrap();
                    black_box((tree, blocks))
                })
            });
        });
    }

    group.finish();
}

fn bench_bulk(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let config = ProllyConfig::default();

    let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
    let map = rt
        .block_on(ProllyMap::create(&config, store, entries(10_000)))
        .unwrap();

    let mut group = c.benchmark_group("prolly_bulk");

    for batch in [1, 10, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, &batch| {
            let mutations: Vec<_> = (0..batch)
                .map(|i| Mutation::put(format!("key-{:08}-x", i * 7), 0u64))
                .collect();
            b.iter(|| {
                rt.block_on(async {
                    let result = map.tree().bulk(mutations.clone()).await.unwrap();
                    black_box(result)
                })
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("prolly_lookup");

    for capacity in [0usize, 1_024].iter() {
        let config = ProllyConfig {
            cache_capacity: *capacity,
            ..Default::default()
        };
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let map = rt
            .block_on(ProllyMap::create(&config, store, entries(10_000)))
            .unwrap();
        let key = "key-00005000".to_string();

        group.bench_with_input(BenchmarkId::new("cache", capacity), &key, |b, key| {
            b.iter(|| {
                rt.block_on(async {
                    let result = map.get(key).await.unwrap();
                    black_box(result)
                })
            });
        });
    }

    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let config = ProllyConfig::default();

    let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
    let map = rt
        .block_on(ProllyMap::create(&config, store, entries(10_000)))
        .unwrap();

    c.bench_function("prolly_range_1000", |b| {
        let start = "key-00002000".to_string();
        let end = "key-00002999".to_string();
        b.iter(|| {
            rt.block_on(async {
                let result = map.range(&start, &end).await.unwrap();
                black_box(result)
            })
        });
    });
}

criterion_group!(benches, bench_create, bench_bulk, bench_lookup, bench_range);
criterion_main!(benches);

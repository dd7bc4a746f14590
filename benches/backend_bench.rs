//! Benchmarks for tablekv backend operations

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tablekv::{Backend, BackendConfig, BucketSelector, SyncStrategy, TableBackend};
use tempfile::TempDir;

const PRELOADED_KEYS: usize = 10_000;

fn start_backend(dir: &TempDir, partition: u64) -> TableBackend {
    let config = BackendConfig::builder()
        .root(dir.path())
        .sync_strategy(SyncStrategy::Manual)
        .build();
    TableBackend::start(partition, &config).unwrap()
}

fn preload(backend: &TableBackend) {
    for i in 0..PRELOADED_KEYS {
        let bucket: &[u8] = if i % 2 == 0 { b"even" } else { b"odd" };
        backend
            .put(bucket, format!("key_{:06}", i).as_bytes(), &[0u8; 128])
            .unwrap();
    }
}

fn backend_benchmarks(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();

    // Single key write throughput
    let writer = start_backend(&dir, 0);
    let mut n = 0u64;
    c.bench_function("put_128b", |b| {
        b.iter(|| {
            n += 1;
            writer
                .put(b"bench", format!("key_{}", n).as_bytes(), &[7u8; 128])
                .unwrap();
        })
    });

    // Single key read throughput
    let reader = start_backend(&dir, 1);
    preload(&reader);
    let mut i = 0usize;
    c.bench_function("get_hit", |b| {
        b.iter(|| {
            i = (i + 1) % PRELOADED_KEYS;
            let bucket: &[u8] = if i % 2 == 0 { b"even" } else { b"odd" };
            reader.get(bucket, format!("key_{:06}", i).as_bytes()).unwrap()
        })
    });

    // Full traversal and bucket-filtered traversal
    c.bench_function("fold_all_10k", |b| {
        b.iter(|| reader.fold(0usize, |_, _, v, acc| acc + v.len()).unwrap())
    });
    let even = BucketSelector::bucket(b"even".to_vec());
    c.bench_function("fold_bucket_10k", |b| {
        b.iter(|| {
            reader
                .fold_bucket_keys(&even, 0usize, |_, _, _, acc| acc + 1)
                .unwrap()
        })
    });

    // Compaction of a table that is mostly dead records
    let mut partition = 100;
    c.bench_function("compact_overwritten", |b| {
        b.iter_batched(
            || {
                partition += 1;
                let backend = start_backend(&dir, partition);
                for round in 0..10u8 {
                    for k in 0..500 {
                        backend
                            .put(b"hot", format!("k{}", k).as_bytes(), &[round; 64])
                            .unwrap();
                    }
                }
                backend
            },
            |backend| backend.compact().unwrap(),
            BatchSize::PerIteration,
        )
    });
}

criterion_group!(benches, backend_benchmarks);
criterion_main!(benches);

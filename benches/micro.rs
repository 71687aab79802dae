//! Micro-benchmarks for `LsmDao`'s core operations.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench micro              # run all micro-benchmarks
//! cargo bench --bench micro -- upsert    # filter by name
//! ```
//!
//! Reports are generated in `target/criterion/report/index.html`.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use lsm_dao::engine::{LsmDao, LsmDaoConfig};
use tempfile::TempDir;

const VALUE_128B: &[u8; 128] = &[0xAB; 128];

fn make_key(i: u64) -> Vec<u8> {
    format!("key-{i:012}").into_bytes()
}

/// Opens a store with a flush threshold large enough that everything
/// written during a benchmark stays in the memtable.
fn open_memtable_only(dir: &std::path::Path) -> LsmDao {
    LsmDao::open(dir, LsmDaoConfig { flush_threshold: 64 * 1024 * 1024 }).expect("open")
}

/// Pre-populates a store with `count` sequential keys under a small
/// flush threshold, so several SSTable generations exist on disk, then
/// closes it.
fn prepopulate(dir: &std::path::Path, count: u64, value: &[u8]) {
    let mut dao = LsmDao::open(dir, LsmDaoConfig { flush_threshold: 4 * 1024 }).expect("open");
    for i in 0..count {
        dao.upsert(make_key(i), value.to_vec()).unwrap();
    }
    dao.close().unwrap();
}

fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");

    group.bench_function("memtable_only", |b| {
        let dir = TempDir::new().unwrap();
        let mut dao = open_memtable_only(dir.path());
        let mut seq = 0u64;

        b.iter(|| {
            let key = make_key(seq);
            dao.upsert(black_box(key), black_box(VALUE_128B.to_vec())).unwrap();
            seq += 1;
        });

        dao.close().unwrap();
    });

    group.bench_function("with_flushes", |b| {
        let dir = TempDir::new().unwrap();
        let mut dao = LsmDao::open(dir.path(), LsmDaoConfig { flush_threshold: 4 * 1024 }).unwrap();
        let mut seq = 0u64;

        b.iter(|| {
            let key = make_key(seq);
            dao.upsert(black_box(key), black_box(VALUE_128B.to_vec())).unwrap();
            seq += 1;
        });

        dao.close().unwrap();
    });

    group.finish();
}

fn bench_iterator_point(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_lookup");

    // Simulate a point lookup via `iterator(key).next()`.
    {
        let dir = TempDir::new().unwrap();
        let mut dao = open_memtable_only(dir.path());
        let n = 10_000u64;
        for i in 0..n {
            dao.upsert(make_key(i), VALUE_128B.to_vec()).unwrap();
        }

        group.bench_function("memtable_hit", |b| {
            let mut i = 0u64;
            b.iter(|| {
                let key = make_key(i % n);
                let _ = black_box(dao.iterator(black_box(&key)).unwrap().next());
                i += 1;
            });
        });

        dao.close().unwrap();
    }

    {
        let dir = TempDir::new().unwrap();
        let n = 5_000u64;
        prepopulate(dir.path(), n, VALUE_128B);
        let dao = LsmDao::open(dir.path(), LsmDaoConfig { flush_threshold: 64 * 1024 * 1024 }).unwrap();

        group.bench_function("sstable_hit", |b| {
            let mut i = 0u64;
            b.iter(|| {
                let key = make_key(i % n);
                let _ = black_box(dao.iterator(black_box(&key)).unwrap().next());
                i += 1;
            });
        });
    }

    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    {
        let dir = TempDir::new().unwrap();
        let mut dao = open_memtable_only(dir.path());
        let n = 10_000u64;
        for i in 0..n {
            dao.upsert(make_key(i), VALUE_128B.to_vec()).unwrap();
        }

        for &range_size in &[10u64, 100, 1000] {
            group.throughput(Throughput::Elements(range_size));
            group.bench_function(BenchmarkId::new("memtable", format!("{range_size}_keys")), |b| {
                let mut offset = 0u64;
                b.iter(|| {
                    let from = make_key(offset % (n - range_size));
                    let results: Vec<_> = dao
                        .iterator(black_box(&from))
                        .unwrap()
                        .take(range_size as usize)
                        .collect();
                    black_box(&results);
                    offset += 1;
                });
            });
        }

        dao.close().unwrap();
    }

    {
        let dir = TempDir::new().unwrap();
        let n = 5_000u64;
        prepopulate(dir.path(), n, VALUE_128B);
        let dao = LsmDao::open(dir.path(), LsmDaoConfig { flush_threshold: 64 * 1024 * 1024 }).unwrap();

        for &range_size in &[10u64, 100, 1000] {
            group.throughput(Throughput::Elements(range_size));
            group.bench_function(BenchmarkId::new("sstable", format!("{range_size}_keys")), |b| {
                let mut offset = 0u64;
                b.iter(|| {
                    let from = make_key(offset % (n - range_size));
                    let results: Vec<_> = dao
                        .iterator(black_box(&from))
                        .unwrap()
                        .take(range_size as usize)
                        .collect();
                    black_box(&results);
                    offset += 1;
                });
            });
        }
    }

    group.finish();
}

fn bench_compact(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact");
    group.sample_size(10);

    for &count in &[1_000u64, 5_000] {
        group.bench_function(BenchmarkId::new("full", count), |b| {
            b.iter_batched(
                || {
                    let dir = TempDir::new().unwrap();
                    prepopulate(dir.path(), count, VALUE_128B);
                    let dao =
                        LsmDao::open(dir.path(), LsmDaoConfig { flush_threshold: 4 * 1024 }).unwrap();
                    (dir, dao)
                },
                |(_dir, mut dao)| {
                    dao.compact().unwrap();
                    dao.close().unwrap();
                },
                criterion::BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

fn bench_open_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("open_recovery");
    group.sample_size(10);

    for &count in &[1_000u64, 10_000] {
        group.bench_function(BenchmarkId::new("open_existing", count), |b| {
            let dir = TempDir::new().unwrap();
            prepopulate(dir.path(), count, VALUE_128B);

            b.iter(|| {
                let dao =
                    LsmDao::open(dir.path(), LsmDaoConfig { flush_threshold: 64 * 1024 * 1024 })
                        .unwrap();
                black_box(&dao);
            });
        });
    }

    group.finish();
}

fn bench_value_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_size");

    let sizes: &[(&str, usize)] = &[("64B", 64), ("256B", 256), ("1K", 1024), ("4K", 4096)];

    for &(label, size) in sizes {
        let value = vec![0xEF_u8; size];

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(BenchmarkId::new("upsert", label), |b| {
            let dir = TempDir::new().unwrap();
            let mut dao = open_memtable_only(dir.path());
            let mut seq = 0u64;
            b.iter(|| {
                let key = make_key(seq);
                dao.upsert(black_box(key), black_box(value.clone())).unwrap();
                seq += 1;
            });
            dao.close().unwrap();
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_upsert,
    bench_iterator_point,
    bench_scan,
    bench_compact,
    bench_open_recovery,
    bench_value_sizes,
);

criterion_main!(benches);

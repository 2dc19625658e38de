use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use tempfile::TempDir;
use tierkv::{DirStore, LruCache, RawItem, Store, StoreExt};
use tokio::runtime::Runtime;

const KEY_COUNT: usize = 1000;

/// Keys "0".."999" in a fixed scrambled order (1009 is coprime with 1000)
fn gen_keys() -> Vec<String> {
    (0..KEY_COUNT)
        .map(|i| ((i * 1009) % KEY_COUNT).to_string())
        .collect()
}

/// Lowercase ASCII payload of the given size
fn gen_value(size: usize) -> Vec<u8> {
    (0..size).map(|i| b'a' + (i * 7 % 26) as u8).collect()
}

fn open_dir(rt: &Runtime) -> (TempDir, DirStore) {
    let tmp = tempfile::tempdir().unwrap();
    let store = rt.block_on(async { DirStore::new(tmp.path()).unwrap() });
    (tmp, store)
}

/// Benchmark: single-key get/set on the directory store and on a cache in front of it
fn bench_single_key(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("single_key");
    let value = b"hello".repeat(1000);
    group.throughput(Throughput::Bytes(value.len() as u64));

    let (_tmp, dir) = open_dir(&rt);
    rt.block_on(dir.put("foo", RawItem::new(value.clone()))).unwrap();

    group.bench_function("store_get", |b| {
        b.iter(|| black_box(dir.get("foo", RawItem::default())))
    });

    group.bench_function("store_set", |b| {
        let item = Arc::new(RawItem::new(value.clone()));
        b.iter(|| {
            let _ = dir.set("foo", Some(item.clone()));
        });
        rt.block_on(dir.flush()).unwrap();
    });

    let cache = LruCache::with_backend(1, Arc::new(dir.clone())).unwrap();
    let _ = cache.put("foo", RawItem::new(value.clone()));

    group.bench_function("cache_get", |b| {
        b.iter(|| black_box(cache.get("foo", RawItem::default())))
    });

    group.bench_function("cache_set", |b| {
        let item = Arc::new(RawItem::new(value.clone()));
        b.iter(|| {
            let _ = cache.set("foo", Some(item.clone()));
        });
    });

    group.finish();
}

/// Benchmark: writes of different value sizes over a shuffled key set
fn bench_write(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("write");
    let keys = gen_keys();

    for size in [32, 1024, 4096, 10240] {
        let (_tmp, dir) = open_dir(&rt);
        let item = Arc::new(RawItem::new(gen_value(size)));
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            let mut i = 0;
            b.iter(|| {
                let _ = dir.set(&keys[i % keys.len()], Some(item.clone()));
                i += 1;
            });
            rt.block_on(dir.flush()).unwrap();
        });
    }

    group.finish();
}

/// Benchmark: reads through a cache that fits one key versus the whole key set
fn bench_read(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("read");
    let keys = gen_keys();

    for (label, capacity) in [("no_cache", 1), ("with_cache", KEY_COUNT)] {
        for size in [32, 1024, 4096, 10240] {
            let (_tmp, dir) = open_dir(&rt);
            let cache = LruCache::with_backend(capacity, Arc::new(dir.clone())).unwrap();
            let item = Arc::new(RawItem::new(gen_value(size)));
            for key in &keys {
                let _ = cache.set(key, Some(item.clone()));
            }
            rt.block_on(dir.flush()).unwrap();
            group.throughput(Throughput::Bytes(size as u64));

            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, _| {
                let mut i = 0;
                b.iter(|| {
                    black_box(cache.get(&keys[i % keys.len()], RawItem::default()));
                    i += 1;
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_single_key, bench_write, bench_read);
criterion_main!(benches);

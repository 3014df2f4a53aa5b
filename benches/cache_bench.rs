//! Benchmarks for the request cache and offline queue.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use offline_resilience::{CacheConfig, OfflineQueue, RequestCache, TtlTier};
use serde_json::json;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("tokio runtime")
}

fn filled(config: CacheConfig, n: usize) -> RequestCache<String> {
    let cache = RequestCache::new(config);
    for i in 0..n {
        cache.set(format!("listing:{}", i), format!("payload_{}", i));
    }
    cache
}

/// Reads on an unbounded cache versus a bounded one, where every hit also
/// moves the entry to the back of the recency order.
fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("reads");

    let unbounded = filled(CacheConfig::default(), 10_000);
    let bounded = filled(CacheConfig::new().max_capacity(10_000).build(), 10_000);

    for (label, cache) in [("unbounded", &unbounded), ("lru", &bounded)] {
        group.bench_function(BenchmarkId::new("hit", label), |b| {
            let mut i = 0;
            b.iter(|| {
                black_box(cache.get(&format!("listing:{}", i % 10_000)));
                i += 1;
            });
        });
    }

    group.bench_function("miss", |b| {
        b.iter(|| black_box(unbounded.get("listing:absent")));
    });

    group.bench_function("expired_then_removed", |b| {
        let cache = RequestCache::default();
        b.iter_batched(
            || cache.set_with_ttl("stale", 1u32, std::time::Duration::ZERO),
            |_| black_box(cache.get("stale")),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// `get_or_fetch` when the value is cached and when the fetcher must run.
fn bench_cache_aside(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_aside");
    let rt = runtime();

    let cache: RequestCache<Vec<u32>> = RequestCache::default();
    cache.set_tier("cities", (0..64).collect(), TtlTier::VeryLong);

    group.bench_function("cached", |b| {
        b.iter(|| {
            rt.block_on(cache.get_or_fetch("cities", TtlTier::VERY_LONG, || async {
                Ok::<_, String>(Vec::new())
            }))
        });
    });

    group.bench_function("fetch_and_store", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("listing:{}", i);
            i += 1;
            rt.block_on(cache.get_or_fetch(&key, TtlTier::SHORT, || async {
                Ok::<_, String>(vec![1, 2, 3])
            }))
        });
    });

    group.finish();
}

/// Writes into a full bounded cache, each one evicting the oldest entry.
fn bench_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction");

    for capacity in [100usize, 10_000] {
        let cache = filled(CacheConfig::new().max_capacity(capacity).build(), capacity);
        group.bench_with_input(BenchmarkId::new("set_full", capacity), &capacity, |b, _| {
            let mut i = capacity;
            b.iter(|| {
                cache.set(format!("listing:{}", i), "payload".to_string());
                i += 1;
            });
        });
    }

    group.bench_function("cleanup_expired_1000", |b| {
        let cache = RequestCache::default();
        b.iter_batched(
            || {
                for i in 0..1000 {
                    cache.set_with_ttl(format!("k{}", i), i, std::time::Duration::ZERO);
                }
            },
            |_| black_box(cache.cleanup_expired()),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

/// Queue bookkeeping and full replay passes.
fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");
    let rt = runtime();

    group.bench_function("enqueue", |b| {
        let queue = OfflineQueue::default();
        let mut i = 0;
        b.iter(|| {
            black_box(queue.enqueue("update", json!({ "key": i, "value": "v" })));
            i += 1;
        });
    });

    for pending in [10usize, 100] {
        group.throughput(Throughput::Elements(pending as u64));
        group.bench_with_input(BenchmarkId::new("sync_all_success", pending), &pending, |b, &pending| {
            b.iter_batched(
                || {
                    let queue = OfflineQueue::default();
                    for i in 0..pending {
                        queue.enqueue("favorite", json!({ "listing": i }));
                    }
                    queue
                },
                |queue| rt.block_on(queue.sync_all(|_, _| async { Ok::<_, String>(()) })),
                BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("sync_all_failing", pending), &pending, |b, &pending| {
            b.iter_batched(
                || {
                    let queue = OfflineQueue::default();
                    for i in 0..pending {
                        queue.enqueue("favorite", json!({ "listing": i }));
                    }
                    queue
                },
                |queue| rt.block_on(queue.sync_all(|_, _| async { Err::<(), _>("offline") })),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_reads, bench_cache_aside, bench_eviction, bench_queue);
criterion_main!(benches);

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Benchmarks for the read-through paths of the cache.
//!
//! Run with: cargo bench -p sfcache --bench cache

#![allow(missing_docs, reason = "benchmark code")]

use std::{
    convert::Infallible,
    hint::black_box,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use futures_util::{StreamExt, stream::FuturesUnordered};
use sfcache::{Cache, CacheEntry, Expiry, LoadContext};

static NEXT_KEY: AtomicU64 = AtomicU64::new(0);

fn echo_cache(capacity: usize) -> Cache<u64, u64> {
    Cache::new(capacity, |_ctx, key: u64| async move {
        Ok::<_, Infallible>(CacheEntry::present(key, Expiry::after(Duration::from_secs(3600))))
    })
    .expect("valid configuration")
}

/// Every lookup is answered from the store without touching the loader.
fn bench_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let cache = echo_cache(1024);
    let ctx = LoadContext::new();
    rt.block_on(async {
        for key in 0..1024 {
            cache.load(&ctx, &key).await.expect("warm up");
        }
    });

    let mut group = c.benchmark_group("hit");
    group.bench_function("load", |b| {
        let mut key = 0_u64;
        b.to_async(&rt).iter(|| {
            key = (key + 1) % 1024;
            let (cache, ctx) = (cache.clone(), ctx.clone());
            async move { black_box(cache.load(&ctx, &key).await.expect("hit")) }
        });
    });
    group.bench_function("get", |b| {
        let mut key = 0_u64;
        b.iter(|| {
            key = (key + 1) % 1024;
            black_box(cache.get(&key))
        });
    });
    group.finish();
}

/// A cold key is requested by several callers at once; one loads and the rest join.
fn bench_miss_and_join(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let cache = echo_cache(64);
    let ctx = LoadContext::new();

    let mut group = c.benchmark_group("miss_and_join");
    for callers in [1_usize, 8, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(callers), &callers, |b, &callers| {
            b.to_async(&rt).iter(|| {
                let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
                let (cache, ctx) = (cache.clone(), ctx.clone());
                async move {
                    let mut loads: FuturesUnordered<_> = (0..callers).map(|_| cache.load(&ctx, &key)).collect();
                    while let Some(value) = loads.next().await {
                        black_box(value.expect("load"));
                    }
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_hit, bench_miss_and_join);
criterion_main!(benches);

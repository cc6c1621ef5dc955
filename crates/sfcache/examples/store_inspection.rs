// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Using a recording store to see how the cache uses its storage.
//!
//! Run with: cargo run -p sfcache --example store_inspection --features test-util

use std::{convert::Infallible, time::Duration};

use sfcache::{
    Cache, CacheEntry, Expiry, LoadContext,
    testing::{RecordingStore, StoreOp},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cache = Cache::builder::<String, usize>()
        .name("lengths")
        .capacity(2)
        .loader(|_ctx, key: String| async move {
            Ok::<_, Infallible>(CacheEntry::present(key.len(), Expiry::after(Duration::from_secs(10))))
        })
        .store::<RecordingStore<String, CacheEntry<usize>>>()
        .build()?;

    let ctx = LoadContext::new();
    for word in ["alpha", "beta", "alpha", "gamma", "beta"] {
        let length = cache.load(&ctx, &word.to_string()).await?;
        println!("{word}: {length}");
    }
    let _ = cache.peek(&"alpha".to_string());

    for op in cache.inner().operations() {
        match op {
            StoreOp::Get(key) => println!("get    {key}"),
            StoreOp::Peek(key) => println!("peek   {key}"),
            StoreOp::Add { key, value } => println!("add    {key} = {:?}", value.value()),
            StoreOp::Remove(key) => println!("remove {key}"),
            StoreOp::Clear => println!("clear"),
        }
    }
    Ok(())
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Caching "not found" answers so that lookups of missing keys stay off the backend.
//!
//! Ten concurrent requests for a user that does not exist trigger a single backend query,
//! and later requests are answered from the cache until the negative entry expires.

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use sfcache::{Cache, CacheEntry, Expiry, LoadContext, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let users: Arc<HashMap<u64, String>> = Arc::new([(1, "alice".to_string()), (2, "bob".to_string())].into());
    let queries = Arc::new(AtomicUsize::new(0));

    let cache = {
        let queries = Arc::clone(&queries);
        Cache::new(100, move |_ctx, id: u64| {
            let users = Arc::clone(&users);
            let queries = Arc::clone(&queries);
            async move {
                queries.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                let value = Value::from(users.get(&id).cloned());
                // Missing users are re-checked sooner than existing ones are refreshed.
                let ttl = if value.is_present() { Duration::from_secs(60) } else { Duration::from_secs(5) };
                Ok::<_, io::Error>(CacheEntry::new(value, Expiry::after(ttl)))
            }
        })?
    };

    let ctx = LoadContext::new();
    println!("user 1: {}", cache.load(&ctx, &1).await?);

    let lookups: Vec<_> = (0..10)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.load(&LoadContext::new(), &404).await })
        })
        .collect();
    for lookup in lookups {
        match lookup.await? {
            Ok(name) => println!("user 404: {name}"),
            Err(error) if error.is_not_found() => println!("user 404: {error}"),
            Err(error) => return Err(error.into()),
        }
    }

    assert_eq!(cache.get(&404), Some(Value::Absent));
    println!("backend queries: {}", queries.load(Ordering::SeqCst));
    Ok(())
}

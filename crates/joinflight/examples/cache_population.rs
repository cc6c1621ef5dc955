// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates using `JoinGroup` to prevent a thundering herd when populating a cache.
//!
//! Concurrent requests for the same key share a single execution: the first request runs the
//! query and the others receive a copy of its result.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use joinflight::JoinGroup;

#[tokio::main]
async fn main() {
    let group = Arc::new(JoinGroup::<String, String>::new());
    let execution_count = Arc::new(AtomicUsize::new(0));

    println!("Starting 5 concurrent requests for user:123...\n");

    let mut handles = Vec::new();
    for i in 1..=5 {
        let group = Arc::clone(&group);
        let counter = Arc::clone(&execution_count);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now();

            let outcome = group
                .work("user:123".to_string(), || async {
                    let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    println!("  [Request {i}] Running the query (execution #{count})");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    "UserData(name: Alice, age: 30)".to_string()
                })
                .await;

            let elapsed = start.elapsed();
            println!("  [Request {i}] Got result in {elapsed:?} (shared: {}): {}", outcome.shared, outcome.value);
        });

        handles.push(handle);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    let total_executions = execution_count.load(Ordering::SeqCst);
    println!("\nAll requests completed! The query ran {total_executions} time(s) for 5 requests.");
}

//! Load testing for the dispatch pool and the HTTP service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::json;

use batch_dispatch::batch::{BatchResponse, TransactionStatus};
use batch_dispatch::resilience::{BreakerRegistry, BreakerSettings, ResilientCaller};

mod common;
use common::{batch, service_with, ScriptedInvoker};

#[tokio::test]
async fn test_pool_bounds_concurrency_across_batches() {
    let pool_size = 4;
    let invoker = Arc::new(ScriptedInvoker::with_delay(Duration::from_millis(5)));
    let breakers = BreakerRegistry::new(BreakerSettings::default());
    let caller = ResilientCaller::new("transaction-service", invoker.clone(), &breakers);
    let service = Arc::new(service_with(caller, breakers, pool_size));

    // Ten batches of twenty submitted at once share one pool.
    let runs = (0..10).map(|b| {
        let service = service.clone();
        async move {
            let ids: Vec<String> = (0..20).map(|i| format!("b{b}-tx{i}")).collect();
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            service.process_batch(batch(&format!("batch-{b}"), &refs)).await.unwrap()
        }
    });
    let responses = join_all(runs).await;

    for response in &responses {
        assert_eq!(response.results.len(), 20);
        assert!(response.results.iter().all(|r| r.status == TransactionStatus::Success));
    }
    assert!(
        invoker.peak_concurrency() <= pool_size,
        "peak {} exceeded pool size {}",
        invoker.peak_concurrency(),
        pool_size
    );
    assert_eq!(invoker.total_calls(), 200);

    let stats = service.pool_stats();
    assert_eq!(stats.size, pool_size);
    assert_eq!(stats.completed, 200);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn test_pool_reused_for_sequential_batches() {
    let invoker = Arc::new(ScriptedInvoker::new());
    let breakers = BreakerRegistry::new(BreakerSettings::default());
    let caller = ResilientCaller::new("transaction-service", invoker.clone(), &breakers);
    let service = service_with(caller, breakers, 2);

    for round in 0..5 {
        let response = service
            .process_batch(batch(&format!("round-{round}"), &["A", "B", "C"]))
            .await
            .unwrap();
        assert_eq!(response.summary(), (3, 0));
    }
    assert_eq!(service.pool_stats().size, 2);
    assert_eq!(service.pool_stats().completed, 15);
}

#[tokio::test]
async fn test_http_load() {
    let downstream = common::start_programmable_downstream(|_request| async { (200, "{}".into()) }).await;
    let mut config = common::test_config(downstream);
    config.pool.size = 8;
    let invoker = Arc::new(batch_dispatch::downstream::HttpInvoker::new(&config.downstream).unwrap());
    let server = common::start_server(config, invoker).await;

    let concurrency = 10;
    let batches_per_task = 5;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = server.url("/api/v1/bulk-transactions");
    let start = Instant::now();

    let tasks = (0..concurrency).map(|task| {
        let client = client.clone();
        let url = url.clone();
        tokio::spawn(async move {
            let mut ok = 0;
            for n in 0..batches_per_task {
                let body = json!({
                    "batchId": format!("load-{task}-{n}"),
                    "transactions": (0..10).map(|i| json!({
                        "transactionId": format!("t{i}"),
                        "fromAccount": "acct1",
                        "toAccount": "acct2",
                        "amount": "12.50"
                    })).collect::<Vec<_>>()
                });
                let res = client.post(&url).json(&body).send().await.unwrap();
                assert_eq!(res.status(), 200);
                let response: BatchResponse = res.json().await.unwrap();
                if response.summary() == (10, 0) {
                    ok += 1;
                }
            }
            ok
        })
    });

    let completed: usize = join_all(tasks).await.into_iter().map(|r| r.unwrap()).sum();
    let elapsed = start.elapsed();
    println!(
        "Processed {} batches ({} transactions) in {:?}",
        completed,
        completed * 10,
        elapsed
    );

    assert_eq!(completed, concurrency * batches_per_task);
    assert_eq!(server.service.pool_stats().completed, (concurrency * batches_per_task * 10) as u64);

    server.shutdown.trigger();
}

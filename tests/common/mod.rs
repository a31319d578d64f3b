//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use rust_decimal::Decimal;
use tokio::net::TcpListener;

use batch_dispatch::batch::{Batch, BatchService, TransactionRequest};
use batch_dispatch::config::DispatchConfig;
use batch_dispatch::dispatch::{Dispatcher, WorkerPool};
use batch_dispatch::downstream::{DownstreamError, TransactionInvoker};
use batch_dispatch::http::HttpServer;
use batch_dispatch::lifecycle::Shutdown;
use batch_dispatch::observability::MetricsSink;
use batch_dispatch::resilience::{BreakerRegistry, ResilientCaller};

pub fn tx(id: &str) -> TransactionRequest {
    TransactionRequest {
        transaction_id: id.to_string(),
        from_account: "acct1".to_string(),
        to_account: "acct2".to_string(),
        amount: Decimal::new(10_000, 2),
    }
}

pub fn batch(batch_id: &str, ids: &[&str]) -> Batch {
    Batch::new(batch_id, ids.iter().map(|id| tx(id)).collect())
}

pub fn transient(message: &str) -> Result<(), DownstreamError> {
    Err(DownstreamError::Transient(message.to_string()))
}

pub fn permanent(message: &str) -> Result<(), DownstreamError> {
    Err(DownstreamError::Permanent(message.to_string()))
}

/// In-process invoker that replays a per-transaction script, then succeeds.
#[derive(Default)]
pub struct ScriptedInvoker {
    scripts: Mutex<HashMap<String, VecDeque<Result<(), DownstreamError>>>>,
    calls: Mutex<HashMap<String, u32>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each call sleeps `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn script(self, id: &str, results: Vec<Result<(), DownstreamError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), results.into());
        self
    }

    pub fn calls(&self, id: &str) -> u32 {
        *self.calls.lock().unwrap().get(id).unwrap_or(&0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// Highest number of concurrent invocations observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionInvoker for ScriptedInvoker {
    async fn invoke(&self, request: &TransactionRequest) -> Result<(), DownstreamError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(request.transaction_id.clone())
            .or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.scripts
            .lock()
            .unwrap()
            .get_mut(&request.transaction_id)
            .and_then(|script| script.pop_front())
            .unwrap_or(Ok(()))
    }
}

/// Metrics sink that counts increments per counter name.
#[derive(Default)]
pub struct CountingSink {
    counts: Mutex<HashMap<&'static str, u64>>,
}

impl CountingSink {
    pub fn get(&self, counter: &str) -> u64 {
        *self.counts.lock().unwrap().get(counter).unwrap_or(&0)
    }
}

impl MetricsSink for CountingSink {
    fn increment(&self, counter: &'static str) {
        *self.counts.lock().unwrap().entry(counter).or_insert(0) += 1;
    }
}

/// Build a service around `caller`, with its own pool.
pub fn service_with(caller: ResilientCaller, breakers: BreakerRegistry, pool_size: usize) -> BatchService {
    let dispatcher = Dispatcher::new(Arc::new(WorkerPool::new(pool_size, 256)));
    BatchService::new(dispatcher, Arc::new(caller), breakers)
}

/// Start a programmable mock transaction service on an ephemeral port.
///
/// `f` receives each transaction and returns the status code and body to answer with.
pub async fn start_programmable_downstream<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(TransactionRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    let app = Router::new().route(
        "/api/v1/transactions",
        post(move |Json(request): Json<TransactionRequest>| {
            let f = f.clone();
            async move {
                let (status, body) = f(request).await;
                (StatusCode::from_u16(status).unwrap(), body)
            }
        }),
    );

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A config pointing at `downstream`, with fast retries and metrics off.
pub fn test_config(downstream: SocketAddr) -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.downstream.base_url = format!("http://{}", downstream);
    config.downstream.attempt_timeout_ms = 2_000;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;
    config.timeouts.call_timeout_ms = 5_000;
    config.observability.metrics_enabled = false;
    config
}

/// A running service instance.
pub struct TestServer {
    pub addr: SocketAddr,
    pub service: Arc<BatchService>,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the HTTP service on an ephemeral port with the given invoker.
pub async fn start_server(config: DispatchConfig, invoker: Arc<dyn TransactionInvoker>) -> TestServer {
    let service = Arc::new(BatchService::from_config(&config, invoker));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, service.clone());
    let stop = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, async move { stop.wait().await }).await;
    });

    TestServer {
        addr,
        service,
        shutdown,
    }
}

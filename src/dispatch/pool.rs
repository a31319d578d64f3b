//! Long-lived worker pool.
//!
//! # Responsibilities
//! - Run a fixed number of worker tasks for the lifetime of the service
//! - Queue submitted jobs in a bounded channel; submission waits while it is full
//! - Hand each job's output back through a oneshot channel
//! - Survive panicking jobs
//!
//! # Design Decisions
//! - Workers share one receiver behind an async mutex; whichever worker is
//!   idle takes the next job
//! - Closing drops the sender; workers drain what is queued, then exit
//! - Load counters are atomics, mirrored to gauges on every change

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::PoolConfig;
use crate::observability::metrics;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

impl Counters {
    /// Mark one running job as done.
    fn finish(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.publish();
    }

    fn publish(&self) {
        metrics::record_pool_load(
            self.queued.load(Ordering::Relaxed),
            self.active.load(Ordering::Relaxed),
        );
    }
}

/// Point-in-time pool load, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub size: usize,
    pub queue_capacity: usize,
    pub queued: usize,
    pub active: usize,
    pub completed: u64,
    pub panicked: u64,
}

/// Fixed-size pool of worker tasks. Must be created inside a Tokio runtime.
#[derive(Debug)]
pub struct WorkerPool {
    size: usize,
    queue_capacity: usize,
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    pub fn new(size: usize, queue_capacity: usize) -> Self {
        let size = size.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<Job>(queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let counters = Arc::new(Counters::default());

        let workers = (0..size)
            .map(|id| tokio::spawn(worker_loop(id, receiver.clone(), counters.clone())))
            .collect();

        tracing::info!(size, queue_capacity, "Worker pool started");

        Self {
            size,
            queue_capacity,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            counters,
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.size, config.queue_capacity)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `job` and return a receiver for its output.
    ///
    /// Waits while the queue is full. The receiver errors if the job
    /// panicked or was dropped unrun.
    pub async fn submit<F, T>(&self, fut: F) -> Result<oneshot::Receiver<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self
            .sender
            .lock()
            .expect("worker pool mutex poisoned")
            .clone()
            .ok_or(PoolError::Closed)?;

        let (tx, rx) = oneshot::channel();
        let counters = self.counters.clone();
        let job: Job = Box::pin(async move {
            let output = fut.await;
            // Counted before the submitter can observe the output.
            counters.finish();
            // The submitter may have gone away; the job still ran.
            let _ = tx.send(output);
        });

        // Nothing is counted until a slot is reserved, so a submitter
        // cancelled while the queue is full leaves no trace.
        let slot = sender.reserve().await.map_err(|_| PoolError::Closed)?;
        self.counters.queued.fetch_add(1, Ordering::Relaxed);
        self.counters.publish();
        slot.send(job);
        Ok(rx)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().expect("worker pool mutex poisoned").is_none()
    }

    /// Stop accepting jobs. Queued jobs still run.
    pub fn close(&self) {
        if self
            .sender
            .lock()
            .expect("worker pool mutex poisoned")
            .take()
            .is_some()
        {
            tracing::info!("Worker pool closed to new jobs");
        }
    }

    /// Close, then wait up to `grace` for workers to drain the queue.
    /// Workers still busy after the grace period are aborted.
    /// Returns true if every worker finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.close();
        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.workers.lock().expect("worker pool mutex poisoned"));
        if handles.is_empty() {
            return true;
        }

        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        match tokio::time::timeout(grace, join_all(handles)).await {
            Ok(_) => {
                tracing::info!("Worker pool drained");
                true
            }
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    remaining = self.counters.queued.load(Ordering::Relaxed)
                        + self.counters.active.load(Ordering::Relaxed),
                    "Worker pool did not drain in time; aborting workers"
                );
                false
            }
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.size,
            queue_capacity: self.queue_capacity,
            queued: self.counters.queued.load(Ordering::Relaxed),
            active: self.counters.active.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }
}

async fn worker_loop(
    id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>,
    counters: Arc<Counters>,
) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else { break };

        // Active first: queued + active never dips below the real load.
        counters.active.fetch_add(1, Ordering::Relaxed);
        counters.queued.fetch_sub(1, Ordering::Relaxed);
        counters.publish();

        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            counters.finish();
            tracing::error!(worker = id, "Job panicked; worker continues");
        }
    }
    tracing::debug!(worker = id, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_returns_output() {
        let pool = WorkerPool::new(2, 8);
        let rx = pool.submit(async { 21 * 2 }).await.unwrap();
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_size() {
        let pool = WorkerPool::new(3, 64);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut receivers = Vec::new();
        for _ in 0..20 {
            let running = running.clone();
            let peak = peak.clone();
            let rx = pool
                .submit(async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            receivers.push(rx);
        }
        for rx in receivers {
            rx.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.stats().completed, 20);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1, 4);
        let bad = pool.submit(async { panic!("boom") }).await.unwrap();
        assert!(bad.await.is_err());

        let good = pool.submit(async { "still alive" }).await.unwrap();
        assert_eq!(good.await.unwrap(), "still alive");
        assert_eq!(pool.stats().panicked, 1);
    }

    #[tokio::test]
    async fn test_submit_after_close_fails() {
        let pool = WorkerPool::new(1, 4);
        pool.close();
        assert!(pool.is_closed());
        assert_eq!(pool.submit(async {}).await.unwrap_err(), PoolError::Closed);
    }

    #[tokio::test]
    async fn test_cancelled_submit_leaves_no_queued_job() {
        let pool = WorkerPool::new(1, 1);
        let _running = pool
            .submit(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let _waiting = pool.submit(async {}).await.unwrap();

        // Queue is full: this submission waits and is then abandoned.
        let blocked = tokio::time::timeout(Duration::from_millis(20), pool.submit(async {})).await;
        assert!(blocked.is_err());
        assert_eq!(pool.stats().queued, 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_jobs() {
        let pool = WorkerPool::new(1, 8);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let done = done.clone();
            pool.submit(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                done.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        }
        assert!(pool.shutdown(Duration::from_secs(5)).await);
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_shutdown_gives_up_after_grace() {
        let pool = WorkerPool::new(1, 4);
        let _rx = pool
            .submit(tokio::time::sleep(Duration::from_secs(60)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!pool.shutdown(Duration::from_millis(20)).await);
    }
}

//! Batch processing entry point.
//!
//! # Responsibilities
//! - Reject structurally invalid batches before any dispatch
//! - Fan the batch out through the dispatcher, one resilient call per item
//! - Build the response and record batch-level metrics
//!
//! # Design Decisions
//! - `process_batch` fails only on invalid input; per-item failures are results
//! - The pool, the breaker registry and the caller are shared across batches

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::batch::aggregator::build_response;
use crate::batch::types::{Batch, BatchError, BatchResponse};
use crate::batch::validation::validate_structure;
use crate::config::DispatchConfig;
use crate::dispatch::{Dispatcher, PoolStats, WorkerPool};
use crate::downstream::TransactionInvoker;
use crate::observability::metrics;
use crate::observability::tracing::batch_span;
use crate::resilience::circuit_breaker::BreakerSnapshot;
use crate::resilience::clock::SystemClock;
use crate::resilience::{BreakerRegistry, BreakerSettings, ResilientCaller, RetryBudget};

#[derive(Debug, Clone)]
pub struct BatchService {
    dispatcher: Dispatcher,
    caller: Arc<ResilientCaller>,
    breakers: BreakerRegistry,
}

impl BatchService {
    pub fn new(dispatcher: Dispatcher, caller: Arc<ResilientCaller>, breakers: BreakerRegistry) -> Self {
        Self {
            dispatcher,
            caller,
            breakers,
        }
    }

    /// Wire the pool, breakers, retry budget and caller from configuration.
    /// Must be called inside a Tokio runtime.
    pub fn from_config(config: &DispatchConfig, invoker: Arc<dyn TransactionInvoker>) -> Self {
        let breakers = BreakerRegistry::new(BreakerSettings::from_config(&config.circuit_breaker));
        let budget = Arc::new(RetryBudget::from_config(&config.retries, Arc::new(SystemClock)));
        let caller = ResilientCaller::from_config(config, invoker, &breakers, Some(budget));
        let dispatcher = Dispatcher::new(Arc::new(WorkerPool::from_config(&config.pool)));
        Self::new(dispatcher, Arc::new(caller), breakers)
    }

    /// Process every transaction of `batch` and report one result per input.
    pub async fn process_batch(&self, batch: Batch) -> Result<BatchResponse, BatchError> {
        validate_structure(&batch).map_err(BatchError::Validation)?;

        let span = batch_span(&batch.batch_id, batch.len());
        let response = async move {
            let start = Instant::now();
            tracing::info!("Processing batch");

            let caller = self.caller.clone();
            let results = self
                .dispatcher
                .dispatch(&batch, move |_context, request| {
                    let caller = caller.clone();
                    async move { caller.call(&request).await }
                })
                .await;

            let response = build_response(&batch.batch_id, results);
            let (succeeded, failed) = response.summary();
            metrics::record_batch(batch.len(), failed, start);
            tracing::info!(
                succeeded,
                failed,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Batch processed"
            );
            response
        }
        .instrument(span)
        .await;
        Ok(response)
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.dispatcher.stats()
    }

    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

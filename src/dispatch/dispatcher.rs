//! Batch fan-out onto the worker pool.
//!
//! # Responsibilities
//! - Submit one job per transaction, in input order
//! - Wait for every job, then return results in input order
//! - Turn lost jobs into `FAILED` results instead of dropping them
//!
//! # Design Decisions
//! - Each item future is instrumented with its own span, so the correlation
//!   context is entered only while that item is polled
//! - Jobs are owned by the pool; abandoning `dispatch` does not cancel
//!   items that were already submitted

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;

use crate::batch::aggregator::collect_results;
use crate::batch::{Batch, TransactionRequest, TransactionResult};
use crate::dispatch::context::ItemContext;
use crate::dispatch::pool::{PoolError, PoolStats, WorkerPool};
use crate::resilience::Outcome;

/// Why an item produced no outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemLost {
    #[error("{0}")]
    Pool(#[from] PoolError),
    #[error("job was dropped before completing")]
    Dropped,
}

/// Runs every transaction of a batch on a shared [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Arc<WorkerPool>,
}

impl Dispatcher {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Run `per_item` for every transaction and collect one result per input,
    /// in input order.
    pub async fn dispatch<F, Fut>(&self, batch: &Batch, per_item: F) -> Vec<TransactionResult>
    where
        F: FnMut(ItemContext, TransactionRequest) -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let outcomes = self.run_all(batch, per_item).await;
        collect_results(batch, outcomes)
    }

    /// Like [`Dispatcher::dispatch`], but returns raw outcomes.
    pub async fn run_all<F, Fut>(&self, batch: &Batch, mut per_item: F) -> Vec<Result<Outcome, ItemLost>>
    where
        F: FnMut(ItemContext, TransactionRequest) -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let batch_id: Arc<str> = Arc::from(batch.batch_id.as_str());

        let mut pending = Vec::with_capacity(batch.len());
        for (index, request) in batch.transactions.iter().enumerate() {
            let context = ItemContext::new(batch_id.clone(), request.transaction_id.clone(), index);
            let span = context.span();
            let job = per_item(context, request.clone()).instrument(span);
            pending.push(self.pool.submit(job).await);
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for submitted in pending {
            let outcome = match submitted {
                Ok(receiver) => receiver.await.map_err(|_| ItemLost::Dropped),
                Err(e) => Err(ItemLost::from(e)),
            };
            outcomes.push(outcome);
        }

        tracing::debug!(batch_id = %batch_id, items = outcomes.len(), "Dispatch complete");
        outcomes
    }
}

//! Result aggregation.
//!
//! Pure mapping from per-item outcomes to the batch response. Running it
//! twice over the same outcomes yields the same response, and partial
//! failure is ordinary data.

use crate::batch::types::{Batch, BatchResponse, TransactionResult};
use crate::dispatch::ItemLost;
use crate::resilience::Outcome;

/// Reason prefix for items that never produced an outcome.
pub const NOT_PROCESSED: &str = "transaction was not processed";

pub fn transaction_result(transaction_id: &str, outcome: &Result<Outcome, ItemLost>) -> TransactionResult {
    match outcome {
        Ok(outcome) => match &outcome.failure {
            None => TransactionResult::success(transaction_id, outcome.attempts),
            Some(failure) => TransactionResult::failed(transaction_id, failure.message.clone(), outcome.attempts),
        },
        Err(lost) => TransactionResult::failed(transaction_id, format!("{}: {}", NOT_PROCESSED, lost), 0),
    }
}

/// One result per transaction, in batch order.
///
/// Missing trailing outcomes are reported as not processed.
pub fn collect_results(batch: &Batch, outcomes: Vec<Result<Outcome, ItemLost>>) -> Vec<TransactionResult> {
    let mut outcomes = outcomes.into_iter();
    batch
        .transactions
        .iter()
        .map(|tx| {
            let outcome = outcomes.next().unwrap_or(Err(ItemLost::Dropped));
            transaction_result(&tx.transaction_id, &outcome)
        })
        .collect()
}

pub fn build_response(batch_id: &str, results: Vec<TransactionResult>) -> BatchResponse {
    BatchResponse {
        batch_id: batch_id.to_string(),
        results,
    }
}

//! Correlation spans.
//!
//! Batch and transaction identifiers travel as span fields rather than
//! ambient state; a span is entered only while its future is polled.

use tracing::Span;

/// Span covering one whole batch.
pub fn batch_span(batch_id: &str, size: usize) -> Span {
    tracing::info_span!("batch", batch_id = %batch_id, size = size)
}

/// Span covering one transaction inside a batch.
pub fn transaction_span(batch_id: &str, transaction_id: &str, index: usize) -> Span {
    tracing::info_span!(
        "transaction",
        batch_id = %batch_id,
        transaction_id = %transaction_id,
        index = index
    )
}

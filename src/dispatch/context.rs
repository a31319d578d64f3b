//! Per-item correlation context.

use std::sync::Arc;

use tracing::Span;

use crate::observability::tracing::transaction_span;

/// Identifies one transaction within a batch.
///
/// Passed explicitly to the per-item function; never stored in
/// task-local or thread-local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemContext {
    pub batch_id: Arc<str>,
    pub transaction_id: String,
    /// Position in the submitted batch.
    pub index: usize,
}

impl ItemContext {
    pub fn new(batch_id: Arc<str>, transaction_id: impl Into<String>, index: usize) -> Self {
        Self {
            batch_id,
            transaction_id: transaction_id.into(),
            index,
        }
    }

    /// Span that carries this context on every log line emitted by the item.
    pub fn span(&self) -> Span {
        transaction_span(&self.batch_id, &self.transaction_id, self.index)
    }
}

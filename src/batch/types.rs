//! Batch, transaction, and result types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::validation::FieldError;

/// A single transfer to be forwarded to the downstream transaction service.
///
/// Missing fields deserialize to empty values so validation can report them
/// by field path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Caller-supplied identifier, echoed back in the matching result.
    pub transaction_id: String,
    /// Source account.
    pub from_account: String,
    /// Destination account.
    pub to_account: String,
    /// Amount to transfer.
    pub amount: Decimal,
}

/// A named group of transactions submitted together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Batch {
    pub batch_id: String,
    pub transactions: Vec<TransactionRequest>,
}

impl Batch {
    pub fn new(batch_id: impl Into<String>, transactions: Vec<TransactionRequest>) -> Self {
        Self {
            batch_id: batch_id.into(),
            transactions,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Final status of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// Per-transaction result, produced exactly once per input request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub transaction_id: String,
    pub status: TransactionStatus,
    /// Failure reason; absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Downstream invocations made for this transaction.
    #[serde(default)]
    pub attempts: u32,
}

impl TransactionResult {
    pub fn success(transaction_id: impl Into<String>, attempts: u32) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status: TransactionStatus::Success,
            reason: None,
            attempts,
        }
    }

    pub fn failed(transaction_id: impl Into<String>, reason: impl Into<String>, attempts: u32) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            status: TransactionStatus::Failed,
            reason: Some(reason.into()),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TransactionStatus::Success
    }
}

/// Aggregated response for a batch, results in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_id: String,
    pub results: Vec<TransactionResult>,
}

impl BatchResponse {
    /// Count of (succeeded, failed) results.
    pub fn summary(&self) -> (usize, usize) {
        let succeeded = self.results.iter().filter(|r| r.is_success()).count();
        (succeeded, self.results.len() - succeeded)
    }
}

/// Errors that fail a whole batch call.
///
/// Individual transaction failures never surface here; they become
/// `FAILED` results.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The batch is structurally invalid and was not dispatched.
    #[error("invalid batch: {}", describe(.0))]
    Validation(Vec<FieldError>),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = r#"{
            "batchId": "batch-1",
            "transactions": [
                {"transactionId": "A", "fromAccount": "acct1", "toAccount": "acct2", "amount": 100.25},
                {"transactionId": "B", "fromAccount": "acct1", "toAccount": "acct3", "amount": "7.5"}
            ]
        }"#;
        let batch: Batch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.batch_id, "batch-1");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.transactions[0].amount, Decimal::from_str("100.25").unwrap());
        assert_eq!(batch.transactions[1].amount, Decimal::from_str("7.5").unwrap());
    }

    #[test]
    fn test_missing_fields_deserialize_empty() {
        let batch: Batch = serde_json::from_str(r#"{"transactions": [{"transactionId": "A"}]}"#).unwrap();
        assert!(batch.batch_id.is_empty());
        assert_eq!(batch.transactions[0].transaction_id, "A");
        assert!(batch.transactions[0].from_account.is_empty());
        assert_eq!(batch.transactions[0].amount, Decimal::ZERO);

        let empty: Batch = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_reason_omitted_on_success() {
        let ok = serde_json::to_value(TransactionResult::success("A", 1)).unwrap();
        assert_eq!(ok["status"], "SUCCESS");
        assert!(ok.get("reason").is_none());

        let failed = serde_json::to_value(TransactionResult::failed("B", "rejected", 1)).unwrap();
        assert_eq!(failed["status"], "FAILED");
        assert_eq!(failed["reason"], "rejected");
        assert_eq!(failed["transactionId"], "B");
    }

    #[test]
    fn test_summary_counts() {
        let response = BatchResponse {
            batch_id: "b".into(),
            results: vec![
                TransactionResult::success("A", 1),
                TransactionResult::failed("B", "x", 3),
                TransactionResult::success("C", 2),
            ],
        };
        assert_eq!(response.summary(), (2, 1));
    }
}

//! Batch validation.
//!
//! # Responsibilities
//! - Structural checks required before any dispatch (batch id, non-empty list)
//! - Field-level request rules applied at the API boundary
//!
//! # Design Decisions
//! - Returns all errors, not just the first
//! - Pure functions: `&Batch -> Result<(), Vec<FieldError>>`
//! - Duplicate transaction ids are accepted; results are correlated by position

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::batch::types::Batch;

/// A single validation failure, keyed by field path (e.g. `transactions[1].amount`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Smallest accepted transfer amount (0.01).
const MIN_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Checks the batch can be dispatched at all.
pub fn validate_structure(batch: &Batch) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if batch.batch_id.trim().is_empty() {
        errors.push(FieldError::new("batchId", "BatchId is required"));
    }
    if batch.transactions.is_empty() {
        errors.push(FieldError::new("transactions", "At least one transaction is required"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Structural checks plus per-transaction field rules.
pub fn validate_fields(batch: &Batch) -> Result<(), Vec<FieldError>> {
    let mut errors = match validate_structure(batch) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    for (i, tx) in batch.transactions.iter().enumerate() {
        let path = |name: &str| format!("transactions[{}].{}", i, name);

        if tx.transaction_id.trim().is_empty() {
            errors.push(FieldError::new(path("transactionId"), "TransactionId is required"));
        }
        if tx.from_account.trim().is_empty() {
            errors.push(FieldError::new(path("fromAccount"), "Source account is required"));
        }
        if tx.to_account.trim().is_empty() {
            errors.push(FieldError::new(path("toAccount"), "Destination account is required"));
        }
        if tx.amount < MIN_AMOUNT {
            errors.push(FieldError::new(
                path("amount"),
                format!("Amount must be at least {}", MIN_AMOUNT),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::TransactionRequest;
    use std::str::FromStr;

    fn tx(id: &str, amount: &str) -> TransactionRequest {
        TransactionRequest {
            transaction_id: id.into(),
            from_account: "acct1".into(),
            to_account: "acct2".into(),
            amount: Decimal::from_str(amount).unwrap(),
        }
    }

    #[test]
    fn test_valid_batch() {
        let batch = Batch::new("batch-1", vec![tx("A", "100"), tx("B", "0.01")]);
        assert!(validate_structure(&batch).is_ok());
        assert!(validate_fields(&batch).is_ok());
    }

    #[test]
    fn test_structure_reports_all_errors() {
        let batch = Batch::new("  ", vec![]);
        let errors = validate_structure(&batch).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "batchId");
        assert_eq!(errors[1].field, "transactions");
    }

    #[test]
    fn test_field_paths() {
        let mut bad = tx("", "0");
        bad.to_account = String::new();
        let batch = Batch::new("batch-1", vec![tx("A", "5"), bad]);

        let errors = validate_fields(&batch).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["transactions[1].transactionId", "transactions[1].toAccount", "transactions[1].amount"]
        );
        // Structure alone is fine; field rules are an API-boundary concern.
        assert!(validate_structure(&batch).is_ok());
    }

    #[test]
    fn test_duplicate_ids_allowed() {
        let batch = Batch::new("batch-1", vec![tx("A", "1"), tx("A", "2")]);
        assert!(validate_fields(&batch).is_ok());
    }
}

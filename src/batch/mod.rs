//! Batch model and processing.
//!
//! # Data Flow
//! ```text
//! Batch (deserialized request)
//!     → validation.rs (structure; field rules at the HTTP edge)
//!     → service.rs (dispatch with one ResilientCaller call per item)
//!     → aggregator.rs (outcomes → TransactionResult, input order)
//!     → BatchResponse
//! ```

pub mod aggregator;
pub mod service;
pub mod types;
pub mod validation;

pub use service::BatchService;
pub use types::{
    Batch, BatchError, BatchResponse, TransactionRequest, TransactionResult, TransactionStatus,
};
pub use validation::FieldError;

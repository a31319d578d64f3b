//! Downstream transaction service boundary.
//!
//! # Data Flow
//! ```text
//! ResilientCaller
//!     → TransactionInvoker::invoke (one attempt)
//!     → client.rs (HTTP POST) or any other implementation
//!     → Ok(()) | DownstreamError::{Transient, Permanent}
//! ```

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::batch::TransactionRequest;

pub use client::HttpInvoker;
pub use error::{DownstreamError, InvokerBuildError};

/// Performs a single downstream invocation for one transaction.
#[async_trait]
pub trait TransactionInvoker: Send + Sync {
    async fn invoke(&self, request: &TransactionRequest) -> Result<(), DownstreamError>;
}

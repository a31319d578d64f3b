//! Batch dispatch service library.
//!
//! Fans each batch of transactions out over a shared worker pool, calls the
//! downstream transaction service once per item through retry, deadline and
//! circuit breaker, and returns one result per input in input order.

// Core subsystems
pub mod batch;
pub mod dispatch;
pub mod downstream;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use batch::{Batch, BatchResponse, BatchService};
pub use config::DispatchConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

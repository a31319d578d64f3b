//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical call to a downstream endpoint (caller.rs):
//!     → timeouts.rs (one deadline for all attempts and backoff)
//!     → registry.rs → circuit_breaker.rs (admit or short-circuit each attempt)
//!     → On transient failure: retries.rs (attempt cap, retry budget)
//!         → backoff.rs (exponential delay with jitter)
//!     → Outcome (success, or failure with kind and reason)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every logical call has a deadline
//! - Only transient failures are retried
//! - One breaker per endpoint, shared by every caller of that endpoint
//! - Time comes from an injectable clock so breaker timing is testable

pub mod backoff;
pub mod caller;
pub mod circuit_breaker;
pub mod clock;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use caller::{CallFailure, FailureKind, Outcome, ResilientCaller};
pub use circuit_breaker::{BreakerSettings, CircuitState};
pub use registry::BreakerRegistry;
pub use retries::{RetryBudget, RetryPolicy};

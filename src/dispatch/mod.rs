//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Batch
//!     → dispatcher.rs (one job per transaction, ItemContext + span each)
//!     → pool.rs (bounded queue → fixed set of long-lived workers)
//!     → oneshot per job → outcomes in input order
//!     → batch::aggregator (TransactionResult per input)
//! ```
//!
//! # Design Decisions
//! - One pool for the whole process; batches never spawn their own tasks
//! - Backpressure comes from the bounded queue, not from rejecting work

pub mod context;
pub mod dispatcher;
pub mod pool;

pub use context::ItemContext;
pub use dispatcher::{Dispatcher, ItemLost};
pub use pool::{PoolError, PoolStats, WorkerPool};

//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Trigger → HTTP server stops accepting → in-flight requests finish
//!     → worker pool closed → queued jobs drain within the grace period
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: workers still busy after the grace period are aborted

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;

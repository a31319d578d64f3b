//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a whole logical call (all attempts plus backoff) by one deadline
//! - Race each attempt against the remaining time
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - A backoff sleep that would cross the deadline is skipped, not started

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{timeout_at, Instant};

/// The call deadline passed before the operation finished.
#[derive(Debug, Clone, Copy, Error)]
#[error("deadline of {}ms exceeded", .budget.as_millis())]
pub struct DeadlineExceeded {
    pub budget: Duration,
}

/// Absolute deadline for one logical call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// True if sleeping `delay` still leaves time for another attempt.
    pub fn allows(&self, delay: Duration) -> bool {
        Instant::now() + delay < self.at
    }

    /// Run `fut`, giving up at the deadline.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineExceeded> {
        timeout_at(self.at, fut)
            .await
            .map_err(|_| DeadlineExceeded { budget: self.budget })
    }
}

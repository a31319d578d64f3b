//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed attempt may be retried
//! - Compute the delay before the next attempt
//! - Enforce retry budget (max retries per time window)
//!
//! # Design Decisions
//! - Only transient failures are retried; permanent failures never are
//! - Jittered backoff prevents thundering herd
//! - Retry budget prevents retry storms under load

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::RetryConfig;
use crate::downstream::DownstreamError;
use crate::resilience::backoff::Backoff;
use crate::resilience::clock::Clock;

/// Per-call retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per logical call, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// True if another attempt is allowed after `attempts` have failed with `error`.
    pub fn should_retry(&self, attempts: u32, error: &DownstreamError) -> bool {
        attempts < self.max_attempts && is_retryable(error)
    }

    /// Delay to sleep after the given 1-based attempt failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Backoff::from_millis(self.base_delay_ms, self.max_delay_ms).delay(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Transient failures may succeed on a later attempt.
pub fn is_retryable(error: &DownstreamError) -> bool {
    error.is_transient()
}

struct BudgetWindow {
    started: Instant,
    calls: u64,
    retries: u64,
}

/// Caps the number of retries relative to the number of calls in a window.
///
/// Allowed retries per window: `max(min_retries, ratio * calls)`.
pub struct RetryBudget {
    ratio: f64,
    min_retries: u64,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<BudgetWindow>,
}

impl RetryBudget {
    pub fn new(ratio: f64, min_retries: u64, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            ratio: ratio.max(0.0),
            min_retries,
            window,
            clock,
            state: Mutex::new(BudgetWindow {
                started,
                calls: 0,
                retries: 0,
            }),
        }
    }

    pub fn from_config(config: &RetryConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config.budget_ratio,
            config.budget_min_retries,
            Duration::from_secs(config.budget_window_secs.max(1)),
            clock,
        )
    }

    fn roll(&self, window: &mut BudgetWindow) {
        let now = self.clock.now();
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.calls = 0;
            window.retries = 0;
        }
    }

    /// Record one logical call.
    pub fn record_call(&self) {
        let mut window = self.state.lock().expect("retry budget mutex poisoned");
        self.roll(&mut window);
        window.calls += 1;
    }

    /// Try to spend one retry from the budget.
    pub fn try_spend(&self) -> bool {
        let mut window = self.state.lock().expect("retry budget mutex poisoned");
        self.roll(&mut window);
        let allowed = ((window.calls as f64) * self.ratio) as u64;
        if window.retries < allowed.max(self.min_retries) {
            window.retries += 1;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Debug for RetryBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryBudget")
            .field("ratio", &self.ratio)
            .field("min_retries", &self.min_retries)
            .field("window", &self.window)
            .finish()
    }
}

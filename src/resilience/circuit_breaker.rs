//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream assumed down, calls fail fast
//! - Half-Open: testing if downstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure rate >= threshold over the sliding window (once minimum samples reached)
//! Open → Half-Open: after open duration
//! Half-Open → Closed: every trial call succeeds
//! Half-Open → Open: any trial call fails
//! ```
//!
//! # Design Decisions
//! - Per-endpoint circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Limited trial calls in Half-Open (prevents hammering recovering downstream)
//! - Permits are RAII guards: a permit dropped without an outcome frees its
//!   trial slot and is not counted
//! - Outcomes from permits issued before the last transition are ignored

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::clock::Clock;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Tuning for a single breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerSettings {
    /// Failure ratio in (0, 1] at which the breaker opens.
    pub failure_rate_threshold: f64,
    /// Outcomes required in the window before the rate is evaluated.
    pub minimum_samples: usize,
    /// Number of most recent outcomes kept.
    pub window_size: usize,
    pub open_duration: Duration,
    /// Trial calls let through while half-open.
    pub half_open_max_calls: u32,
}

impl BreakerSettings {
    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_rate_threshold: config.failure_rate_threshold,
            minimum_samples: config.minimum_samples.max(1),
            window_size: config.window_size.max(config.minimum_samples).max(1),
            open_duration: Duration::from_millis(config.open_duration_ms),
            half_open_max_calls: config.half_open_max_calls.max(1),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from_config(&CircuitBreakerConfig::default())
    }
}

/// Rejection returned while the breaker is not admitting calls.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker open for '{endpoint}'")]
pub struct CircuitOpen {
    pub endpoint: String,
    /// Time left before a trial call may be admitted, when known.
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// Sliding window of outcomes; `true` marks a failure.
    window: VecDeque<bool>,
    failures: usize,
    open_until: Option<Instant>,
    trials_in_flight: u32,
    trial_successes: u32,
    /// Bumped on every transition.
    generation: u64,
}

impl Inner {
    fn reset_window(&mut self) {
        self.window.clear();
        self.failures = 0;
    }

    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.failures as f64 / self.window.len() as f64
        }
    }
}

/// Point-in-time view of a breaker, for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub endpoint: String,
    pub state: CircuitState,
    pub samples: usize,
    pub failure_rate: f64,
}

/// Circuit breaker guarding one downstream endpoint.
#[derive(Debug)]
pub struct CircuitBreaker {
    endpoint: String,
    settings: BreakerSettings,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(endpoint: impl Into<String>, settings: BreakerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            endpoint: endpoint.into(),
            settings,
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(settings.window_size),
                failures: 0,
                open_until: None,
                trials_in_flight: 0,
                trial_successes: 0,
                generation: 0,
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.trials_in_flight = 0;
        inner.trial_successes = 0;

        match to {
            CircuitState::Open => {
                inner.open_until = Some(self.clock.now() + self.settings.open_duration);
                tracing::warn!(
                    endpoint = %self.endpoint,
                    from = from.as_str(),
                    open_for = ?self.settings.open_duration,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!(endpoint = %self.endpoint, "Circuit breaker half-open, admitting trial calls");
            }
            CircuitState::Closed => {
                inner.open_until = None;
                inner.reset_window();
                tracing::info!(endpoint = %self.endpoint, from = from.as_str(), "Circuit breaker closed");
            }
        }
        metrics::record_breaker_transition(&self.endpoint, to.as_str());
    }

    /// Apply the Open → Half-Open timer, if due.
    fn advance_timer(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open {
            if let Some(until) = inner.open_until {
                if self.clock.now() >= until {
                    self.transition(inner, CircuitState::HalfOpen);
                }
            }
        }
    }

    /// Current state, with the open timer applied.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.advance_timer(&mut inner);
        inner.state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.lock();
        self.advance_timer(&mut inner);
        BreakerSnapshot {
            endpoint: self.endpoint.clone(),
            state: inner.state,
            samples: inner.window.len(),
            failure_rate: inner.failure_rate(),
        }
    }

    /// Ask to make one downstream call.
    pub fn try_acquire(self: &Arc<Self>) -> Result<BreakerPermit, CircuitOpen> {
        let mut inner = self.lock();
        self.advance_timer(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(BreakerPermit::new(self.clone(), inner.generation, false)),
            CircuitState::HalfOpen if inner.trials_in_flight < self.settings.half_open_max_calls => {
                inner.trials_in_flight += 1;
                Ok(BreakerPermit::new(self.clone(), inner.generation, true))
            }
            CircuitState::HalfOpen => Err(CircuitOpen {
                endpoint: self.endpoint.clone(),
                retry_after: None,
            }),
            CircuitState::Open => {
                let now = self.clock.now();
                Err(CircuitOpen {
                    endpoint: self.endpoint.clone(),
                    retry_after: inner.open_until.map(|until| until.saturating_duration_since(now)),
                })
            }
        }
    }

    fn push_outcome(&self, inner: &mut Inner, failed: bool) {
        inner.window.push_back(failed);
        if failed {
            inner.failures += 1;
        }
        while inner.window.len() > self.settings.window_size {
            if inner.window.pop_front() == Some(true) {
                inner.failures -= 1;
            }
        }
    }

    fn on_success(&self, generation: u64, trial: bool) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        match inner.state {
            CircuitState::Closed => self.push_outcome(&mut inner, false),
            CircuitState::HalfOpen if trial => {
                inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
                inner.trial_successes += 1;
                if inner.trial_successes >= self.settings.half_open_max_calls {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            _ => {}
        }
    }

    fn on_failure(&self, generation: u64, trial: bool) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        match inner.state {
            CircuitState::Closed => {
                self.push_outcome(&mut inner, true);
                if inner.window.len() >= self.settings.minimum_samples
                    && inner.failure_rate() >= self.settings.failure_rate_threshold
                {
                    inner.reset_window();
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen if trial => {
                self.transition(&mut inner, CircuitState::Open);
            }
            _ => {}
        }
    }

    fn on_abandon(&self, generation: u64, trial: bool) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen && trial {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }
}

/// Admission to make one call. Must be settled with an outcome; dropping it
/// unsettled releases the slot without counting anything.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl BreakerPermit {
    fn new(breaker: Arc<CircuitBreaker>, generation: u64, trial: bool) -> Self {
        Self {
            breaker,
            generation,
            trial,
            settled: false,
        }
    }

    /// True if this permit is a half-open trial call.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.generation, self.trial);
    }

    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.generation, self.trial);
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandon(self.generation, self.trial);
        }
    }
}

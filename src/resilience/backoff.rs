//! Delay schedule between retry attempts.
//!
//! The delay doubles per failed attempt starting at `base`, is capped at
//! `max`, and is stretched by up to `jitter` (a fraction of the capped delay)
//! so that items failing together do not retry in lockstep.

use std::time::Duration;

use rand::Rng;

/// Default jitter: up to 10% on top of the capped delay.
pub const DEFAULT_JITTER: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            jitter: DEFAULT_JITTER,
        }
    }

    pub fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms), Duration::from_millis(max_ms))
    }

    /// Replace the jitter fraction. Negative or NaN values disable jitter.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_nan() { 0.0 } else { jitter.max(0.0) };
        self
    }

    /// Delay after `failed_attempt` (1-based) before jitter is applied.
    pub fn ceiling(&self, failed_attempt: u32) -> Duration {
        let Some(doublings) = failed_attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let factor = 1u32.checked_shl(doublings).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Jittered delay after `failed_attempt`, drawn from the thread-local rng.
    pub fn delay(&self, failed_attempt: u32) -> Duration {
        self.delay_with(failed_attempt, &mut rand::thread_rng())
    }

    pub fn delay_with<R: Rng + ?Sized>(&self, failed_attempt: u32, rng: &mut R) -> Duration {
        let ceiling = self.ceiling(failed_attempt);
        let spread = ceiling.mul_f64(self.jitter);
        if spread.is_zero() {
            return ceiling;
        }
        ceiling + spread.mul_f64(rng.gen::<f64>())
    }
}

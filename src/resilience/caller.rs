//! Resilient downstream caller.
//!
//! Wraps one downstream invocation with deadline, retry, circuit breaker and
//! fallback, and always returns a classified [`Outcome`]. Failures are data;
//! nothing escapes unclassified, including a panicking invoker.
//!
//! # Call Flow
//! ```text
//! call(request)
//!     → breaker.try_acquire()          open → fallback "service unavailable"
//!     → invoker.invoke() under deadline
//!         ok        → record success, done
//!         permanent → done, no retry
//!         transient → record failure; retry with backoff while
//!                     attempts, deadline and budget allow
//!     → exhausted → fallback "downstream unavailable"
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;

use crate::batch::TransactionRequest;
use crate::config::DispatchConfig;
use crate::downstream::{DownstreamError, TransactionInvoker};
use crate::observability::metrics::{self, MetricsSink, TRANSACTIONS_FAILURE, TRANSACTIONS_SUCCESS};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::registry::BreakerRegistry;
use crate::resilience::retries::{RetryBudget, RetryPolicy};
use crate::resilience::timeouts::Deadline;

/// Reason prefix when the breaker short-circuits a call.
pub const SERVICE_UNAVAILABLE: &str = "service unavailable";
/// Reason prefix when retries or the deadline are exhausted.
pub const DOWNSTREAM_UNAVAILABLE: &str = "downstream unavailable";

/// Classification of a failed logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient failures persisted through every allowed attempt.
    Transient,
    /// Downstream rejected the transaction.
    Permanent,
    /// The call deadline elapsed.
    Timeout,
    /// The circuit breaker refused the call.
    CircuitOpen,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
            FailureKind::Timeout => "timeout",
            FailureKind::CircuitOpen => "circuit_open",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Result of one logical call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Downstream invocations made.
    pub attempts: u32,
    pub failure: Option<CallFailure>,
}

impl Outcome {
    pub fn success(attempts: u32) -> Self {
        Self {
            attempts,
            failure: None,
        }
    }

    pub fn failed(kind: FailureKind, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            attempts,
            failure: Some(CallFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }
}

/// Calls one downstream endpoint with resilience semantics.
pub struct ResilientCaller {
    endpoint: String,
    invoker: Arc<dyn TransactionInvoker>,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
    budget: Option<Arc<RetryBudget>>,
    call_timeout: Duration,
    metrics: Arc<dyn MetricsSink>,
}

impl ResilientCaller {
    /// Caller with default policy, no retry budget, a 10s deadline and the
    /// `metrics` facade as sink.
    pub fn new(
        endpoint: impl Into<String>,
        invoker: Arc<dyn TransactionInvoker>,
        breakers: &BreakerRegistry,
    ) -> Self {
        let endpoint = endpoint.into();
        let breaker = breakers.get(&endpoint);
        Self {
            endpoint,
            invoker,
            breaker,
            policy: RetryPolicy::default(),
            budget: None,
            call_timeout: Duration::from_secs(10),
            metrics: Arc::new(metrics::FacadeSink),
        }
    }

    /// Caller configured from the `retries`, `timeouts` and `downstream` sections.
    pub fn from_config(
        config: &DispatchConfig,
        invoker: Arc<dyn TransactionInvoker>,
        breakers: &BreakerRegistry,
        budget: Option<Arc<RetryBudget>>,
    ) -> Self {
        let mut caller = Self::new(config.downstream.endpoint.clone(), invoker, breakers)
            .with_policy(RetryPolicy::from_config(&config.retries))
            .with_call_timeout(Duration::from_millis(config.timeouts.call_timeout_ms));
        caller.budget = budget;
        caller
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_budget(mut self, budget: Arc<RetryBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Perform one logical call. Counters are incremented exactly once.
    pub async fn call(&self, request: &TransactionRequest) -> Outcome {
        let outcome = self.execute(request).await;

        match &outcome.failure {
            None => {
                self.metrics.increment(TRANSACTIONS_SUCCESS);
                tracing::info!(attempts = outcome.attempts, "Transaction succeeded");
            }
            Some(failure) => {
                self.metrics.increment(TRANSACTIONS_FAILURE);
                metrics::record_failure_kind(failure.kind.as_str());
                tracing::error!(
                    attempts = outcome.attempts,
                    kind = failure.kind.as_str(),
                    reason = %failure.message,
                    "Transaction failed"
                );
            }
        }
        outcome
    }

    async fn execute(&self, request: &TransactionRequest) -> Outcome {
        let deadline = Deadline::after(self.call_timeout);
        if let Some(budget) = &self.budget {
            budget.record_call();
        }

        let mut attempts: u32 = 0;
        loop {
            let permit = match self.breaker.try_acquire() {
                Ok(permit) => permit,
                Err(open) => {
                    metrics::record_breaker_rejection(&self.endpoint);
                    tracing::warn!(
                        endpoint = %self.endpoint,
                        attempts,
                        retry_after = ?open.retry_after,
                        "Circuit open, falling back"
                    );
                    return Outcome::failed(
                        FailureKind::CircuitOpen,
                        format!("{}: {}", SERVICE_UNAVAILABLE, open),
                        attempts,
                    );
                }
            };
            attempts += 1;

            let attempt = AssertUnwindSafe(self.invoker.invoke(request)).catch_unwind();
            let result = match deadline.run(attempt).await {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(DownstreamError::Transient(format!(
                    "downstream invoker panicked: {}",
                    panic_message(panic.as_ref())
                ))),
                Err(exceeded) => {
                    permit.record_failure();
                    return Outcome::failed(
                        FailureKind::Timeout,
                        format!(
                            "{}: call timed out after {}ms",
                            DOWNSTREAM_UNAVAILABLE,
                            exceeded.budget.as_millis()
                        ),
                        attempts,
                    );
                }
            };

            let error = match result {
                Ok(()) => {
                    permit.record_success();
                    return Outcome::success(attempts);
                }
                Err(error) => error,
            };

            if !error.is_transient() {
                // The downstream answered; a rejection says nothing about its health.
                permit.record_success();
                return Outcome::failed(FailureKind::Permanent, error.message(), attempts);
            }
            permit.record_failure();

            if !self.policy.should_retry(attempts, &error) {
                return Outcome::failed(
                    FailureKind::Transient,
                    format!("{}: {}", DOWNSTREAM_UNAVAILABLE, error),
                    attempts,
                );
            }

            let delay = self.policy.delay_after(attempts);
            if !deadline.allows(delay) {
                return Outcome::failed(
                    FailureKind::Timeout,
                    format!(
                        "{}: {} (no time left to retry within {}ms)",
                        DOWNSTREAM_UNAVAILABLE,
                        error,
                        deadline.budget().as_millis()
                    ),
                    attempts,
                );
            }

            if let Some(budget) = &self.budget {
                if !budget.try_spend() {
                    return Outcome::failed(
                        FailureKind::Transient,
                        format!("{}: {} (retry budget exhausted)", DOWNSTREAM_UNAVAILABLE, error),
                        attempts,
                    );
                }
            }

            metrics::record_retry(&self.endpoint);
            tracing::info!(attempt = attempts, delay = ?delay, error = %error, "Retrying transaction");
            tokio::time::sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for ResilientCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientCaller")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

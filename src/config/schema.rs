//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dispatch
//! service. All types derive Serde traits for deserialization from config
//! files, and every section has defaults so a minimal file is valid.

use serde::{Deserialize, Serialize};

/// Root configuration for the batch dispatch service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DispatchConfig {
    /// HTTP listener (bind address, body limit).
    pub listener: ListenerConfig,

    /// Shared worker pool.
    pub pool: PoolConfig,

    /// Retry policy and retry budget.
    pub retries: RetryConfig,

    /// Per-endpoint circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Call, request and shutdown timeouts.
    pub timeouts: TimeoutConfig,

    /// Downstream transaction service.
    pub downstream: DownstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of long-lived workers; the global concurrency bound.
    pub size: usize,

    /// Jobs that may wait for a worker before submitters are held back.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 10,
            queue_capacity: 1024,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Retries allowed per call within a window (1.0 = one retry per call).
    pub budget_ratio: f64,

    /// Retries always allowed per window regardless of traffic.
    pub budget_min_retries: u64,

    /// Length of the retry budget window in seconds.
    pub budget_window_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            budget_ratio: 1.0,
            budget_min_retries: 100,
            budget_window_secs: 10,
        }
    }
}

/// Circuit breaker configuration, applied to every endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failure ratio in (0, 1] at which the breaker opens.
    pub failure_rate_threshold: f64,

    /// Outcomes required before the failure rate is evaluated.
    pub minimum_samples: usize,

    /// Sliding window of most recent outcomes.
    pub window_size: usize,

    /// Time spent open before admitting trial calls, in milliseconds.
    pub open_duration_ms: u64,

    /// Trial calls admitted while half-open.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            minimum_samples: 10,
            window_size: 20,
            open_duration_ms: 30_000,
            half_open_max_calls: 1,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for one logical downstream call, retries included.
    pub call_timeout_ms: u64,

    /// Total time allowed for one HTTP request in seconds.
    pub request_secs: u64,

    /// Time allowed to drain in-flight work on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 10_000,
            request_secs: 120,
            shutdown_grace_secs: 30,
        }
    }
}

/// Downstream transaction service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Logical endpoint name; keys the circuit breaker.
    pub endpoint: String,

    /// Base URL (e.g., "http://localhost:8081").
    pub base_url: String,

    /// Path joined onto the base URL.
    pub path: String,

    /// Timeout for one HTTP attempt in milliseconds.
    pub attempt_timeout_ms: u64,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: "transaction-service".to_string(),
            base_url: "http://localhost:8081".to_string(),
            path: "/api/v1/transactions".to_string(),
            attempt_timeout_ms: 5_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: DispatchConfig = toml::from_str("").unwrap();
        assert_eq!(config.pool.size, 10);
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.downstream.endpoint, "transaction-service");
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: DispatchConfig = toml::from_str(
            r#"
            [pool]
            size = 4

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.pool.size, 4);
        assert_eq!(config.pool.queue_capacity, 1024);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }
}

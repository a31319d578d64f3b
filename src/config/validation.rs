//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool size > 0, thresholds in range, timeouts > 0)
//! - Check that addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DispatchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::DispatchConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &DispatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::new("listener.max_body_bytes", "must be greater than 0"));
    }

    if config.pool.size == 0 {
        errors.push(ValidationError::new("pool.size", "must be greater than 0"));
    }
    if config.pool.queue_capacity == 0 {
        errors.push(ValidationError::new("pool.queue_capacity", "must be greater than 0"));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }
    if retries.budget_ratio.is_nan() || retries.budget_ratio < 0.0 {
        errors.push(ValidationError::new("retries.budget_ratio", "must be 0 or greater"));
    }
    if retries.budget_window_secs == 0 {
        errors.push(ValidationError::new("retries.budget_window_secs", "must be greater than 0"));
    }

    let breaker = &config.circuit_breaker;
    let threshold = breaker.failure_rate_threshold;
    if threshold.is_nan() || threshold <= 0.0 || threshold > 1.0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_rate_threshold",
            "must be in (0, 1]",
        ));
    }
    if breaker.minimum_samples == 0 {
        errors.push(ValidationError::new("circuit_breaker.minimum_samples", "must be greater than 0"));
    }
    if breaker.window_size < breaker.minimum_samples {
        errors.push(ValidationError::new(
            "circuit_breaker.window_size",
            "must be at least circuit_breaker.minimum_samples",
        ));
    }
    if breaker.half_open_max_calls == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.half_open_max_calls",
            "must be greater than 0",
        ));
    }

    if config.timeouts.call_timeout_ms == 0 {
        errors.push(ValidationError::new("timeouts.call_timeout_ms", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let downstream = &config.downstream;
    if downstream.endpoint.trim().is_empty() {
        errors.push(ValidationError::new("downstream.endpoint", "must not be empty"));
    }
    match Url::parse(&downstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "downstream.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("downstream.base_url", e.to_string())),
    }
    if downstream.attempt_timeout_ms == 0 {
        errors.push(ValidationError::new("downstream.attempt_timeout_ms", "must be greater than 0"));
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&DispatchConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = DispatchConfig::default();
        config.pool.size = 0;
        config.circuit_breaker.failure_rate_threshold = 1.5;
        config.downstream.base_url = "ftp://example.com".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["pool.size", "circuit_breaker.failure_rate_threshold", "downstream.base_url"]
        );
    }

    #[test]
    fn test_window_smaller_than_minimum() {
        let mut config = DispatchConfig::default();
        config.circuit_breaker.minimum_samples = 30;
        config.circuit_breaker.window_size = 20;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "circuit_breaker.window_size");
    }

    #[test]
    fn test_metrics_address_ignored_when_disabled() {
        let mut config = DispatchConfig::default();
        config.observability.metrics_enabled = false;
        config.observability.metrics_address = "nonsense".to_string();
        assert!(validate_config(&config).is_ok());
    }
}

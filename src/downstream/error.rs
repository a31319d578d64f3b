//! Downstream error classification.

use thiserror::Error;

/// Failure of one downstream invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownstreamError {
    /// Network failure, timeout or 5xx-equivalent. Worth retrying.
    #[error("{0}")]
    Transient(String),

    /// Business rejection or 4xx-equivalent. Retrying cannot help.
    #[error("{0}")]
    Permanent(String),
}

impl DownstreamError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DownstreamError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            DownstreamError::Transient(m) | DownstreamError::Permanent(m) => m,
        }
    }
}

/// Errors building an invoker from configuration.
#[derive(Debug, Error)]
pub enum InvokerBuildError {
    #[error("invalid downstream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

//! HTTP invoker for the downstream transaction service.
//!
//! Each transaction is POSTed as JSON to `<base_url><path>`.
//! Connection errors, timeouts, 5xx, 408 and 429 are transient;
//! any other non-success status is permanent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use url::Url;

use crate::batch::TransactionRequest;
use crate::config::DownstreamConfig;
use crate::downstream::error::{DownstreamError, InvokerBuildError};
use crate::downstream::TransactionInvoker;

/// Forwards transactions over HTTP.
#[derive(Debug, Clone)]
pub struct HttpInvoker {
    client: reqwest::Client,
    url: Url,
}

impl HttpInvoker {
    pub fn new(config: &DownstreamConfig) -> Result<Self, InvokerBuildError> {
        let url = endpoint_url(&config.base_url, &config.path)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.attempt_timeout_ms))
            .user_agent(concat!("batch-dispatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        tracing::info!(url = %url, "Downstream invoker configured");
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl TransactionInvoker for HttpInvoker {
    async fn invoke(&self, request: &TransactionRequest) -> Result<(), DownstreamError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

/// `path` is appended to `base_url`, keeping any prefix the base carries.
fn endpoint_url(base_url: &str, path: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

fn classify_transport(error: reqwest::Error) -> DownstreamError {
    if error.is_builder() {
        DownstreamError::Permanent(format!("invalid downstream request: {}", error))
    } else if error.is_timeout() {
        DownstreamError::Transient(format!("downstream request timed out: {}", error))
    } else {
        DownstreamError::Transient(format!("downstream request failed: {}", error))
    }
}

/// Map a non-success HTTP status and body to a classified error.
pub fn classify_status(status: StatusCode, body: &str) -> DownstreamError {
    let body = body.trim();
    let message = if body.is_empty() {
        status.to_string()
    } else {
        body.to_string()
    };

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        DownstreamError::Transient(message)
    } else {
        DownstreamError::Permanent(message)
    }
}

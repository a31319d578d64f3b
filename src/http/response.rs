//! Error responses.
//!
//! # Responsibilities
//! - Map request and batch errors to HTTP status codes
//! - Render a uniform JSON error body
//!
//! # Design Decisions
//! - Per-transaction failures are never errors here; they travel in a 200 body
//! - Validation errors list every offending field, not just the first

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::batch::{BatchError, FieldError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// The body parsed but broke field rules.
    #[error("Invalid request parameters")]
    Validation(Vec<FieldError>),

    /// The body could not be read or parsed.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "Validation Error",
            ApiError::Rejected { status, .. } => status.canonical_reason().unwrap_or("Error"),
        }
    }

    fn details(&self) -> Option<BTreeMap<String, String>> {
        match self {
            ApiError::Validation(errors) => Some(
                errors
                    .iter()
                    .map(|e| (e.field.clone(), e.message.clone()))
                    .collect(),
            ),
            ApiError::Rejected { .. } => None,
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(error: BatchError) -> Self {
        match error {
            BatchError::Validation(errors) => ApiError::Validation(errors),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Well-formed JSON of the wrong shape is still a bad request.
        let status = match &rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => StatusCode::BAD_REQUEST,
            other => other.status(),
        };
        ApiError::Rejected {
            status,
            message: rejection.body_text(),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");

        let body = ErrorBody {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: self.label(),
            message: self.to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}

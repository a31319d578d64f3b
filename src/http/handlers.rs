//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::batch::validation::validate_fields;
use crate::batch::{Batch, BatchResponse};
use crate::dispatch::PoolStats;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::resilience::circuit_breaker::BreakerSnapshot;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub pool: PoolStats,
    pub breakers: Vec<BreakerSnapshot>,
}

/// `POST /api/v1/bulk-transactions`
pub async fn bulk_transactions(
    State(state): State<AppState>,
    payload: Result<Json<Batch>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(batch) = payload?;
    validate_fields(&batch).map_err(ApiError::Validation)?;

    tracing::info!(
        batch_id = %batch.batch_id,
        transactions = batch.len(),
        "Bulk transaction request received"
    );
    let response = state.service.process_batch(batch).await?;
    Ok(Json(response))
}

/// `GET /health`
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "UP" })
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        pool: state.service.pool_stats(),
        breakers: state.service.breaker_snapshots(),
    })
}

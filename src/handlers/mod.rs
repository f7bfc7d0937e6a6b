//! HTTP request handlers
//!
//! Handlers stay thin: extract, delegate to the service layer, wrap the
//! result in the standard response envelope.

pub mod booking;
pub mod payment;
pub mod shuttle;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::db;
use crate::state::AppState;

/// Health check endpoint, includes database connectivity
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match db::check_health(&state.db_pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "database": "connected",
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "database": "unreachable",
                })),
            )
        }
    }
}

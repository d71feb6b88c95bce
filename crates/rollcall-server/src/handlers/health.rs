//! health check endpoint handler

use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDateTime;
use serde::Serialize;
use tokio::time::timeout;
use tracing::warn;

use crate::AppState;

/// timeout for the database ping
const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// health check response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: NaiveDateTime,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

/// `GET /api/health`
///
/// 200 with `"status": "ok"` when the database answers within a second,
/// 500 with `"status": "error"` otherwise.
pub async fn health(State(state): State<AppState>) -> Response {
    let ping = timeout(PING_TIMEOUT, state.db.health_check()).await;

    let (code, status, message) = match ping {
        Ok(Ok(())) => (StatusCode::OK, "ok", "Fingerprint Attendance System API is running"),
        Ok(Err(e)) => {
            warn!(error = %e, "health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "error", "Database unavailable")
        }
        Err(_) => {
            warn!("health check timed out");
            (StatusCode::INTERNAL_SERVER_ERROR, "error", "Database unavailable")
        }
    };

    let body = HealthResponse {
        status,
        message,
        timestamp: state.now(),
    };
    (code, Json(body)).into_response()
}

//! # Health Check Handler

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value as JsonValue};

use crate::error::ApiError;
use crate::server::AppState;

/// `GET /healthz`: liveness plus a database round-trip.
pub async fn healthz(State(state): State<AppState>) -> Result<Json<JsonValue>, ApiError> {
    if let Err(err) = crate::db::health_check(&state.db).await {
        tracing::error!(error = %err, "Database health check failed");
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Database is unreachable",
        ));
    }

    Ok(Json(json!({
        "status": "ok",
        "database": "ok",
    })))
}

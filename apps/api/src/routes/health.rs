use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Liveness only: no I/O.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "resume-api"
    }))
}

/// GET {prefix}/health
/// Readiness: round-trips the store.
pub async fn readiness_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.users.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "status": "healthy",
                "timestamp": Utc::now().to_rfc3339(),
                "uptime": state.started_at.elapsed().as_secs_f64(),
                "environment": state.config.app_env.as_str()
            })),
        ),
        Err(e) => {
            tracing::warn!("Readiness check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "status": "unhealthy",
                    "error": "Database connection failed",
                    "timestamp": Utc::now().to_rfc3339()
                })),
            )
        }
    }
}

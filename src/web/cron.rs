//! Scheduler-facing trigger for the optimizer.

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use secrecy::ExposeSecret;
use serde_json::json;
use sha2::{Digest, Sha256};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/cron/optimize", get(optimize).post(optimize))
}

/// Bearer token check, compared as SHA-256 digests.
fn bearer_matches(headers: &HeaderMap, secret: &str) -> bool {
    let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return false;
    };
    Sha256::digest(token.trim().as_bytes()) == Sha256::digest(secret.as_bytes())
}

/// GET|POST /api/cron/optimize
///
/// Runs one optimization pass. Requires `Authorization: Bearer <cron secret>`.
async fn optimize(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !bearer_matches(&headers, state.settings.cron_secret.expose_secret()) {
        tracing::warn!("Rejected cron trigger with missing or invalid token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "Unauthorized" })),
        )
            .into_response();
    }

    match state.optimizer.run().await {
        Ok(report) => Json(json!({
            "success": true,
            "status": "completed",
            "details": report,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Optimization run failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "status": "failed",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

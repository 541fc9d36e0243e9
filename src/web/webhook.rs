//! Platform webhook: verification handshake and event acknowledgement.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use secrecy::ExposeSecret;
use serde::Deserialize;

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/webhooks/meta", get(verify).post(receive))
}

#[derive(Debug, Deserialize)]
struct HubQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /api/webhooks/meta
///
/// Echoes `hub.challenge` when `hub.mode=subscribe` and the token matches.
async fn verify(State(state): State<AppState>, Query(q): Query<HubQuery>) -> Response {
    let expected = state.settings.webhook_verify_token.expose_secret();
    match (q.mode.as_deref(), q.verify_token.as_deref(), q.challenge) {
        (Some("subscribe"), Some(token), Some(challenge)) if token == expected => {
            tracing::info!("Webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            tracing::warn!(mode = ?q.mode, "Webhook verification failed");
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

/// POST /api/webhooks/meta
///
/// Events are acknowledged and logged; nothing else happens yet.
async fn receive(body: Bytes) -> Response {
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(event) => {
            let entries = event
                .get("entry")
                .and_then(|e| e.as_array())
                .map_or(0, Vec::len);
            tracing::info!(
                object = event.get("object").and_then(|o| o.as_str()).unwrap_or("unknown"),
                entries,
                "Webhook event received"
            );
        }
        Err(e) => tracing::warn!(error = %e, bytes = body.len(), "Webhook body is not JSON"),
    }
    (StatusCode::OK, "EVENT_RECEIVED").into_response()
}

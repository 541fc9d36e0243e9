//! OAuth login with the ads platform.
//!
//! `login` redirects to the provider dialog with a random `state` held in a
//! short-lived cookie. `callback` checks it, exchanges the code for a
//! long-lived token, seals it in the vault and upserts the integration. A
//! session cookie is issued when the caller is not already signed in.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::AppState;
use crate::ads::normalize_account_id;
use crate::config::OAUTH_SCOPES;
use crate::error::{ActionError, ActionResponse, ActionResult};
use crate::identity::{
    self, SESSION_COOKIE, SESSION_TTL_DAYS, hash_session_token, new_session_token,
};
use crate::store::{ActivityLog, Integration, PLATFORM_META};

const STATE_COOKIE: &str = "adpilot_oauth_state";
const STATE_TTL_SECS: i64 = 600;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/meta/login", get(login))
        .route("/auth/meta/callback", get(callback))
        .route("/auth/logout", post(logout))
}

fn cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut c = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        c.push_str("; Secure");
    }
    c
}

fn fail_redirect(reason: &str) -> Response {
    Redirect::to(&format!("/?error={reason}")).into_response()
}

/// GET /auth/meta/login
async fn login(State(state): State<AppState>) -> Response {
    let settings = &state.settings;
    let oauth_state = new_session_token();

    let url = match reqwest::Url::parse_with_params(
        &settings.dialog_url,
        &[
            ("client_id", settings.app_id.as_str()),
            ("redirect_uri", settings.redirect_uri.as_str()),
            ("state", oauth_state.as_str()),
            ("scope", OAUTH_SCOPES),
            ("response_type", "code"),
        ],
    ) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, "Invalid OAuth dialog URL");
            return fail_redirect("oauth_failed");
        }
    };

    (
        AppendHeaders([(
            SET_COOKIE,
            cookie(STATE_COOKIE, &oauth_state, STATE_TTL_SECS, settings.secure_cookies),
        )]),
        Redirect::to(url.as_str()),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /auth/meta/callback
async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<CallbackQuery>,
) -> Response {
    if let Some(error) = q.error {
        tracing::warn!(error = %error, description = ?q.error_description, "OAuth login denied");
        return fail_redirect("oauth_denied");
    }

    let expected = identity::cookie_value(&headers, STATE_COOKIE);
    let (Some(code), Some(returned), Some(expected)) = (q.code, q.state, expected) else {
        return fail_redirect("oauth_state");
    };
    if returned != expected {
        tracing::warn!("OAuth state mismatch");
        return fail_redirect("oauth_state");
    }

    let existing_user = match state
        .identity
        .resolve(identity::session_token(&headers).as_deref())
        .await
    {
        Ok(identity) => identity.map(|i| i.user_id),
        Err(e) => {
            tracing::error!(error = %e, "Session lookup failed during OAuth callback");
            None
        }
    };

    match connect(&state, &code, existing_user).await {
        Ok(Connected {
            user_id,
            new_session,
        }) => {
            let secure = state.settings.secure_cookies;
            let mut cookies = vec![(SET_COOKIE, cookie(STATE_COOKIE, "", 0, secure))];
            if let Some(token) = new_session {
                cookies.push((
                    SET_COOKIE,
                    cookie(SESSION_COOKIE, &token, SESSION_TTL_DAYS * 86_400, secure),
                ));
            }
            tracing::info!(user_id = %user_id, "Ad account connected");
            (AppendHeaders(cookies), Redirect::to("/")).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "OAuth callback failed");
            fail_redirect("oauth_failed")
        }
    }
}

struct Connected {
    user_id: String,
    new_session: Option<String>,
}

async fn connect(
    state: &AppState,
    code: &str,
    existing_user: Option<String>,
) -> crate::Result<Connected> {
    let short = state
        .api
        .exchange_code(code, &state.settings.redirect_uri)
        .await?;
    let short_token = SecretString::from(short.access_token);

    let token = match state.api.exchange_long_lived(&short_token).await {
        Ok(long) => SecretString::from(long.access_token),
        Err(e) => {
            tracing::warn!(error = %e, "Long-lived token exchange failed, keeping short-lived token");
            short_token
        }
    };

    let me = state.api.get_me(&token).await?;
    let user_id = existing_user.clone().unwrap_or_else(|| me.id.clone());

    let previous = state.db.get_integration(&user_id, PLATFORM_META).await?;
    let ad_account_id = match previous.and_then(|i| i.ad_account_id) {
        Some(id) => Some(id),
        None => state
            .api
            .get_ad_accounts(&token)
            .await?
            .first()
            .map(|a| normalize_account_id(&a.id)),
    };

    let sealed = state.vault.encrypt(token.expose_secret())?;
    let mut integration = Integration::new(&user_id, PLATFORM_META).with_token_ref(sealed);
    integration.ad_account_id = ad_account_id;
    let stored = state.db.upsert_integration(&integration).await?;

    state
        .db
        .append_activity(
            &ActivityLog::new(&user_id, "connect_integration", "Connected ad account", "user")
                .with_metadata(serde_json::json!({
                    "platform": PLATFORM_META,
                    "meta_user_id": me.id,
                    "ad_account_id": stored.ad_account_id,
                })),
        )
        .await?;

    let new_session = if existing_user.is_none() {
        let token = new_session_token();
        state
            .db
            .create_session(
                &hash_session_token(&token),
                &user_id,
                Utc::now() + Duration::days(SESSION_TTL_DAYS),
            )
            .await?;
        Some(token)
    } else {
        None
    };

    Ok(Connected {
        user_id,
        new_session,
    })
}

/// POST /auth/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let result: ActionResult<bool> = async {
        if let Some(token) = identity::session_token(&headers) {
            state
                .db
                .delete_session(&hash_session_token(&token))
                .await
                .map_err(ActionError::from)?;
        }
        Ok(ActionResponse::ok(true))
    }
    .await;

    let clear = cookie(SESSION_COOKIE, "", 0, state.settings.secure_cookies);
    (AppendHeaders([(SET_COOKIE, clear)]), result).into_response()
}

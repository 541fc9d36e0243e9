//! Request identity: who is calling.
//!
//! Handlers never look up the user themselves. They take a [`CurrentUser`],
//! which asks the configured [`IdentityResolver`] to turn the request's
//! session token into an [`Identity`].

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{ActionError, DatabaseError};
use crate::store::Database;

/// Name of the HttpOnly cookie carrying the session token.
pub const SESSION_COOKIE: &str = "adpilot_session";

/// Session lifetime.
pub const SESSION_TTL_DAYS: i64 = 30;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

/// Turns a presented session token into an identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, session_token: Option<&str>) -> Result<Option<Identity>, DatabaseError>;
}

/// Looks the token's digest up in the `sessions` table.
pub struct SessionResolver {
    db: Arc<dyn Database>,
}

impl SessionResolver {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityResolver for SessionResolver {
    async fn resolve(&self, session_token: Option<&str>) -> Result<Option<Identity>, DatabaseError> {
        let Some(token) = session_token else {
            return Ok(None);
        };
        let user = self
            .db
            .get_session_user(&hash_session_token(token))
            .await?;
        Ok(user.map(|user_id| Identity { user_id }))
    }
}

/// Always resolves to one fixed user. Used by tests and local development.
pub struct FixtureResolver {
    user_id: String,
}

impl FixtureResolver {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl IdentityResolver for FixtureResolver {
    async fn resolve(&self, _session_token: Option<&str>) -> Result<Option<Identity>, DatabaseError> {
        Ok(Some(Identity {
            user_id: self.user_id.clone(),
        }))
    }
}

/// Generate a fresh random session token (64 hex chars).
pub fn new_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 hex digest under which a session token is stored.
pub fn hash_session_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Read a named cookie from the `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

/// Session token from the session cookie, else from `Authorization: Bearer`.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE).or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
    })
}

/// Extractor for the resolved caller. Rejects with 401 when nobody is signed in.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl CurrentUser {
    pub fn user_id(&self) -> &str {
        &self.0.user_id
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<dyn IdentityResolver>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ActionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let resolver = Arc::<dyn IdentityResolver>::from_ref(state);
        let token = session_token(&parts.headers);
        match resolver.resolve(token.as_deref()).await? {
            Some(identity) => Ok(CurrentUser(identity)),
            None => Err(ActionError::Unauthorized),
        }
    }
}

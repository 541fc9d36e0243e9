//! Body and query extractors that reject with `{success: false, error}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ActionError;

impl From<JsonRejection> for ActionError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for ActionError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected query string");
        Self::InvalidInput(rejection.body_text())
    }
}

/// JSON request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionJson<T>(pub T);

impl<T, S> FromRequest<S> for ActionJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ActionError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Query string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ActionQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ActionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

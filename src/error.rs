//! Error types for adpilot.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Ads API error: {0}")]
    AdsApi(#[from] AdsApiError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),

    #[error("Creative error: {0}")]
    Creative(#[from] CreativeError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Credential vault errors.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Vault key is invalid: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Stored ciphertext could not be decrypted with the configured key.
    #[error("Stored credential is corrupt: {0}")]
    CredentialCorrupt(String),
}

/// Errors from the advertising platform API.
#[derive(Debug, thiserror::Error)]
pub enum AdsApiError {
    /// Non-2xx response; `message` is the platform's own error message.
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AdsApiError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// HTTP status if this is a remote error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures shared by every flow that needs the user's ad-account credential.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("No active integration for user {user_id}")]
    IntegrationMissing { user_id: String },

    #[error("Integration {integration_id} has no ad account selected")]
    AccountNotSelected { integration_id: String },

    #[error("Integration {integration_id} has no stored credential")]
    CredentialMissing { integration_id: String },

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Campaign sync errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Api(#[from] AdsApiError),

    #[error("Failed to store campaign {meta_campaign_id}: {source}")]
    Upsert {
        meta_campaign_id: String,
        source: DatabaseError,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Optimization run errors. The first one aborts the remaining batch.
#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    #[error("Campaign {campaign_id}: {source}")]
    Credential {
        campaign_id: String,
        source: CredentialError,
    },

    #[error("Failed to pause campaign {meta_campaign_id}: {source}")]
    Pause {
        meta_campaign_id: String,
        source: AdsApiError,
    },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Creative generation errors.
#[derive(Debug, thiserror::Error)]
pub enum CreativeError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("LLM returned no usable creative ideas")]
    Empty,
}

// ── Action boundary ─────────────────────────────────────────────────

const RECONNECT_MESSAGE: &str =
    "Your ad account connection is no longer valid. Please reconnect your account.";
const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Failure of a user-facing action, rendered as `{success: false, error}`.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("No ad account connected. Connect your account to continue.")]
    IntegrationMissing,

    #[error("No ad account selected. Choose an ad account in settings.")]
    AccountNotSelected,

    #[error("{msg}", msg = RECONNECT_MESSAGE)]
    CredentialMissing,

    #[error("{msg}", msg = RECONNECT_MESSAGE)]
    CredentialCorrupt,

    #[error("{0}")]
    Remote(String),

    #[error("{msg}", msg = GENERIC_FAILURE)]
    Database,

    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Not signed in")]
    Unauthorized,
}

impl ActionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::OK,
        }
    }
}

impl From<DatabaseError> for ActionError {
    fn from(e: DatabaseError) -> Self {
        tracing::error!(error = %e, "Database failure in action");
        Self::Database
    }
}

impl From<VaultError> for ActionError {
    fn from(e: VaultError) -> Self {
        tracing::warn!(error = %e, "Credential could not be decrypted");
        Self::CredentialCorrupt
    }
}

impl From<CredentialError> for ActionError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::IntegrationMissing { .. } => Self::IntegrationMissing,
            CredentialError::AccountNotSelected { .. } => Self::AccountNotSelected,
            CredentialError::CredentialMissing { .. } => Self::CredentialMissing,
            CredentialError::Vault(e) => e.into(),
            CredentialError::Database(e) => e.into(),
        }
    }
}

impl From<AdsApiError> for ActionError {
    fn from(e: AdsApiError) -> Self {
        tracing::warn!(error = %e, "Ads API call failed");
        Self::Remote(e.to_string())
    }
}

impl From<LlmError> for ActionError {
    fn from(e: LlmError) -> Self {
        tracing::error!(error = %e, "LLM call failed");
        Self::Failed("Failed to generate creative ideas.".to_string())
    }
}

impl From<CreativeError> for ActionError {
    fn from(e: CreativeError) -> Self {
        match e {
            CreativeError::Llm(e) => e.into(),
            CreativeError::Database(e) => e.into(),
            CreativeError::Empty => {
                tracing::warn!("Creative generation produced no ideas");
                Self::Failed("Failed to generate creative ideas.".to_string())
            }
        }
    }
}

impl From<SyncError> for ActionError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Credential(e) => e.into(),
            SyncError::Api(e) => e.into(),
            other => {
                tracing::error!(error = %other, "Campaign sync failed");
                Self::Failed("Failed to sync campaigns.".to_string())
            }
        }
    }
}

/// Uniform `{success, data?|error?}` payload returned by every action.
#[derive(Debug, Serialize)]
pub struct ActionResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ActionResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        let body = ActionResponse::<()> {
            success: false,
            data: None,
            error: Some(self.to_string()),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result of a user-facing action.
pub type ActionResult<T> = std::result::Result<ActionResponse<T>, ActionError>;

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

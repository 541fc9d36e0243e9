//! Configuration types, built from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default Graph API base URL, including the API version.
pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v21.0";

/// Default dialog URL for the OAuth login redirect.
pub const DEFAULT_DIALOG_URL: &str = "https://www.facebook.com/v21.0/dialog/oauth";

/// Permissions requested during the OAuth login.
pub const OAUTH_SCOPES: &str = "ads_management,ads_read,business_management";

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// Base64-encoded 32-byte key for the credential vault.
    pub vault_key: SecretString,
    /// Bearer token the scheduler must present on `/api/cron/optimize`.
    pub cron_secret: SecretString,
    /// Token echoed back during the webhook verification handshake.
    pub webhook_verify_token: SecretString,
    pub meta: MetaConfig,
    pub optimizer: OptimizerConfig,
    /// Fixed user id that replaces session lookup (local development only).
    pub dev_user: Option<String>,
    /// LLM used for creative generation. `None` disables the endpoint.
    pub llm: Option<LlmConfig>,
    /// Directory for daily-rolling log files. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

/// Advertising platform app credentials and endpoints.
#[derive(Debug, Clone)]
pub struct MetaConfig {
    pub app_id: String,
    pub app_secret: SecretString,
    pub redirect_uri: String,
    pub graph_url: String,
    pub dialog_url: String,
}

/// Optimizer settings.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Campaigns with `0 < roas < min_roas` are paused.
    pub min_roas: f64,
    /// Cron expression for the in-process schedule. `None` means the engine
    /// only runs when the cron endpoint is called.
    pub schedule: Option<String>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_roas: 1.0,
            schedule: None,
        }
    }
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_path = std::env::var("ADPILOT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/adpilot.db"));

        let port: u16 = optional_parse("ADPILOT_PORT")?.unwrap_or(8080);

        let vault_key = SecretString::from(required("ADPILOT_VAULT_KEY")?);
        let cron_secret = SecretString::from(required("ADPILOT_CRON_SECRET")?);
        let webhook_verify_token = SecretString::from(required("ADPILOT_WEBHOOK_VERIFY_TOKEN")?);

        let meta = MetaConfig {
            app_id: std::env::var("META_APP_ID").unwrap_or_default(),
            app_secret: SecretString::from(std::env::var("META_APP_SECRET").unwrap_or_default()),
            redirect_uri: std::env::var("META_REDIRECT_URI")
                .unwrap_or_else(|_| format!("http://localhost:{port}/auth/meta/callback")),
            graph_url: std::env::var("META_GRAPH_URL")
                .unwrap_or_else(|_| DEFAULT_GRAPH_URL.to_string()),
            dialog_url: std::env::var("META_DIALOG_URL")
                .unwrap_or_else(|_| DEFAULT_DIALOG_URL.to_string()),
        };

        let schedule = non_empty("ADPILOT_OPTIMIZE_SCHEDULE");
        if let Some(ref expr) = schedule {
            crate::optimizer::schedule::parse_schedule(expr).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "ADPILOT_OPTIMIZE_SCHEDULE".into(),
                    message: e,
                }
            })?;
        }

        let optimizer = OptimizerConfig {
            min_roas: optional_parse("ADPILOT_MIN_ROAS")?.unwrap_or(1.0),
            schedule,
        };

        Ok(Self {
            db_path,
            port,
            vault_key,
            cron_secret,
            webhook_verify_token,
            meta,
            optimizer,
            dev_user: non_empty("ADPILOT_DEV_USER"),
            llm: llm_from_env(),
            log_dir: non_empty("ADPILOT_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Pick an LLM backend from whichever API key is present (Anthropic first).
fn llm_from_env() -> Option<LlmConfig> {
    let (backend, api_key, default_model) = if let Some(key) = non_empty("ANTHROPIC_API_KEY") {
        (LlmBackend::Anthropic, key, "claude-sonnet-4-20250514")
    } else if let Some(key) = non_empty("OPENAI_API_KEY") {
        (LlmBackend::OpenAi, key, "gpt-4o")
    } else {
        return None;
    };

    Some(LlmConfig {
        backend,
        api_key: SecretString::from(api_key),
        model: non_empty("ADPILOT_LLM_MODEL").unwrap_or_else(|| default_model.to_string()),
    })
}

fn required(key: &str) -> Result<String, ConfigError> {
    non_empty(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn optional_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimizer_defaults() {
        let config = OptimizerConfig::default();
        assert_eq!(config.min_roas, 1.0);
        assert!(config.schedule.is_none());
    }

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let err = required("ADPILOT_TEST_DEFINITELY_UNSET").unwrap_err();
        assert!(err.to_string().contains("ADPILOT_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn optional_parse_absent_is_none() {
        let value: Option<u16> = optional_parse("ADPILOT_TEST_UNSET_PORT").unwrap();
        assert!(value.is_none());
    }
}

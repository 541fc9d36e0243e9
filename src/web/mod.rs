//! HTTP surface: OAuth login, cron trigger, webhook and dashboard actions.

pub mod actions;
pub mod cron;
pub mod extract;
pub mod oauth;
pub mod webhook;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::get;
use secrecy::SecretString;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ads::AdsApi;
use crate::config::AppConfig;
use crate::creative::{CreativeConfig, CreativeGenerator};
use crate::identity::IdentityResolver;
use crate::llm::LlmProvider;
use crate::optimizer::{OptimizationEngine, OptimizationRule};
use crate::store::Database;
use crate::sync::SyncService;
use crate::vault::CredentialVault;

/// Request-independent settings the handlers need.
#[derive(Debug, Clone)]
pub struct WebSettings {
    pub cron_secret: SecretString,
    pub webhook_verify_token: SecretString,
    pub app_id: String,
    pub redirect_uri: String,
    pub dialog_url: String,
    /// Add `Secure` to cookies (served over https).
    pub secure_cookies: bool,
}

impl WebSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cron_secret: config.cron_secret.clone(),
            webhook_verify_token: config.webhook_verify_token.clone(),
            app_id: config.meta.app_id.clone(),
            redirect_uri: config.meta.redirect_uri.clone(),
            dialog_url: config.meta.dialog_url.clone(),
            secure_cookies: config.meta.redirect_uri.starts_with("https://"),
        }
    }
}

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub api: Arc<dyn AdsApi>,
    pub vault: CredentialVault,
    pub identity: Arc<dyn IdentityResolver>,
    pub sync: Arc<SyncService>,
    pub optimizer: Arc<OptimizationEngine>,
    /// `None` when no LLM is configured.
    pub creative: Option<Arc<CreativeGenerator>>,
    pub settings: Arc<WebSettings>,
}

impl AppState {
    pub fn new(
        db: Arc<dyn Database>,
        api: Arc<dyn AdsApi>,
        vault: CredentialVault,
        identity: Arc<dyn IdentityResolver>,
        llm: Option<Arc<dyn LlmProvider>>,
        rule: OptimizationRule,
        settings: WebSettings,
    ) -> Self {
        let sync = Arc::new(SyncService::new(
            Arc::clone(&db),
            Arc::clone(&api),
            vault.clone(),
        ));
        let optimizer = Arc::new(OptimizationEngine::new(
            Arc::clone(&db),
            Arc::clone(&api),
            vault.clone(),
            rule,
        ));
        let creative = llm.map(|llm| {
            Arc::new(CreativeGenerator::new(
                Arc::clone(&db),
                llm,
                CreativeConfig::default(),
            ))
        });

        Self {
            db,
            api,
            vault,
            identity,
            sync,
            optimizer,
            creative,
            settings: Arc::new(settings),
        }
    }
}

impl FromRef<AppState> for Arc<dyn IdentityResolver> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.identity)
    }
}

async fn health() -> &'static str {
    "OK"
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(oauth::routes())
        .merge(cron::routes())
        .merge(webhook::routes())
        .merge(actions::routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

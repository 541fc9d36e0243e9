use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use adpilot::ads::{AdsApi, MetaAdsClient};
use adpilot::config::AppConfig;
use adpilot::identity::{FixtureResolver, IdentityResolver, SessionResolver};
use adpilot::llm::create_provider;
use adpilot::optimizer::schedule::{parse_schedule, spawn_optimizer_schedule};
use adpilot::optimizer::OptimizationRule;
use adpilot::store::{Database, LibSqlBackend};
use adpilot::vault::CredentialVault;
use adpilot::web::{self, AppState, WebSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Keep the guard alive so buffered file logs are flushed on exit.
    let (file_layer, _log_guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "adpilot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("adpilot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );

    // ── Platform + credentials ───────────────────────────────────────────
    let vault = CredentialVault::from_base64(&config.vault_key).context("Invalid vault key")?;
    let api: Arc<dyn AdsApi> = Arc::new(MetaAdsClient::new(&config.meta)?);

    let llm = match &config.llm {
        Some(llm_config) => {
            eprintln!(
                "   Creatives: {} ({})",
                llm_config.model,
                llm_config.backend.as_str()
            );
            Some(create_provider(llm_config)?)
        }
        None => {
            eprintln!("   Creatives: disabled");
            None
        }
    };

    let identity: Arc<dyn IdentityResolver> = match &config.dev_user {
        Some(user) => {
            tracing::warn!(user_id = %user, "Fixture identity enabled; every request acts as this user");
            Arc::new(FixtureResolver::new(user.clone()))
        }
        None => Arc::new(SessionResolver::new(Arc::clone(&db))),
    };

    let rule = OptimizationRule::with_min_roas(config.optimizer.min_roas);
    let state = AppState::new(
        db,
        api,
        vault,
        identity,
        llm,
        rule,
        WebSettings::from_config(&config),
    );

    // ── Optimizer schedule ───────────────────────────────────────────────
    let _schedule_handle = match &config.optimizer.schedule {
        Some(expr) => {
            let schedule = parse_schedule(expr).map_err(anyhow::Error::msg)?;
            eprintln!("   Optimizer: scheduled ({expr})");
            Some(spawn_optimizer_schedule(Arc::clone(&state.optimizer), schedule))
        }
        None => {
            eprintln!("   Optimizer: on demand (/api/cron/optimize)");
            None
        }
    };

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = web::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    eprintln!("   Listening: http://0.0.0.0:{}", config.port);
    tracing::info!(port = config.port, "HTTP server started");

    axum::serve(listener, app).await?;
    Ok(())
}

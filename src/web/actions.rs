//! Dashboard actions. Every handler answers `{success, data?|error?}`.

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::Router;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use super::extract::{ActionJson, ActionQuery};
use crate::ads::{
    AdAccount, BudgetField, Insight, InsightLevel, InsightsQuery, RemoteAd, RemoteAdSet,
    budget_to_cents, normalize_account_id,
};
use crate::credentials;
use crate::creative::{CreativeBrief, CreativeIdea};
use crate::dashboard::{self, DashboardSummary};
use crate::error::{ActionError, ActionResponse, ActionResult};
use crate::identity::CurrentUser;
use crate::store::{
    ActivityLog, BusinessContext, Campaign, CampaignStatus, ContextCategory, Integration,
    ManualRevenue, PLATFORM_META,
};
use crate::sync::SyncReport;

const DEFAULT_ACTIVITY_LIMIT: usize = 50;
const MAX_ACTIVITY_LIMIT: usize = 200;
const DEFAULT_DASHBOARD_DAYS: i64 = 7;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/integration",
            get(get_integration).delete(disconnect_integration),
        )
        .route("/api/integration/account", post(switch_account))
        .route("/api/ad-accounts", get(list_ad_accounts))
        .route("/api/campaigns", get(list_campaigns))
        .route("/api/campaigns/sync", post(sync_campaigns))
        .route("/api/campaigns/{id}/status", post(set_campaign_status))
        .route("/api/campaigns/{id}/adsets", get(list_ad_sets))
        .route("/api/adsets/{id}/ads", get(list_ads))
        .route("/api/budgets", post(update_budget))
        .route("/api/insights", get(get_insights))
        .route("/api/revenue", get(list_revenue).post(save_revenue))
        .route("/api/revenue/{date}", delete(delete_revenue))
        .route("/api/context", get(list_context).post(add_context))
        .route("/api/context/{id}", delete(delete_context))
        .route("/api/activity", get(list_activity))
        .route("/api/creatives", post(generate_creatives))
        .route("/api/dashboard", get(get_dashboard))
}

/// Append to the audit trail. A failed write is logged, not surfaced.
async fn record(state: &AppState, entry: ActivityLog) {
    if let Err(e) = state.db.append_activity(&entry).await {
        tracing::warn!(action = %entry.action_type, error = %e, "Failed to record activity");
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, ActionError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ActionError::invalid(format!("Invalid date '{raw}', expected YYYY-MM-DD")))
}

// ── Integration ─────────────────────────────────────────────────────

/// GET /api/integration
async fn get_integration(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ActionResult<Option<Integration>> {
    let integration = state
        .db
        .get_integration(user.user_id(), PLATFORM_META)
        .await?;
    Ok(ActionResponse::ok(integration))
}

/// DELETE /api/integration
async fn disconnect_integration(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ActionResult<bool> {
    let removed = state
        .db
        .delete_integration(user.user_id(), PLATFORM_META)
        .await?;
    if !removed {
        return Err(ActionError::IntegrationMissing);
    }
    record(
        &state,
        ActivityLog::new(user.user_id(), "disconnect_integration", "Disconnected ad account", "user"),
    )
    .await;
    Ok(ActionResponse::ok(true))
}

#[derive(Debug, Deserialize)]
struct SwitchAccountInput {
    ad_account_id: String,
}

/// POST /api/integration/account
async fn switch_account(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionJson(input): ActionJson<SwitchAccountInput>,
) -> ActionResult<String> {
    if input.ad_account_id.trim().is_empty() {
        return Err(ActionError::invalid("ad_account_id is required"));
    }
    let account = normalize_account_id(&input.ad_account_id);

    let (_, token) = credentials::load_token(state.db.as_ref(), &state.vault, user.user_id()).await?;
    let owned = state
        .api
        .get_ad_accounts(&token)
        .await?
        .iter()
        .any(|a| normalize_account_id(&a.id) == account);
    if !owned {
        tracing::warn!(user_id = %user.user_id(), account = %account, "Rejected switch to an unlisted ad account");
        return Err(ActionError::invalid(
            "That ad account is not available to your connected profile",
        ));
    }

    let updated = state
        .db
        .set_integration_account(user.user_id(), PLATFORM_META, &account)
        .await?;
    if !updated {
        return Err(ActionError::IntegrationMissing);
    }
    record(
        &state,
        ActivityLog::new(
            user.user_id(),
            "switch_account",
            format!("Switched to ad account {account}"),
            "user",
        )
        .with_target(&account, &account),
    )
    .await;
    Ok(ActionResponse::ok(account))
}

/// GET /api/ad-accounts
async fn list_ad_accounts(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ActionResult<Vec<AdAccount>> {
    let (_, token) = credentials::load_token(state.db.as_ref(), &state.vault, user.user_id()).await?;
    let accounts = state.api.get_ad_accounts(&token).await?;
    Ok(ActionResponse::ok(accounts))
}

// ── Campaigns ───────────────────────────────────────────────────────

/// GET /api/campaigns
async fn list_campaigns(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ActionResult<Vec<Campaign>> {
    let (integration, _) = credentials::selected_account(state.db.as_ref(), user.user_id()).await?;
    let campaigns = state.db.list_campaigns(integration.id).await?;
    Ok(ActionResponse::ok(campaigns))
}

/// POST /api/campaigns/sync
async fn sync_campaigns(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ActionResult<SyncReport> {
    let report = state.sync.sync_campaigns(user.user_id()).await?;
    Ok(ActionResponse::ok(report))
}

#[derive(Debug, Deserialize)]
struct StatusInput {
    status: String,
}

#[derive(Debug, Serialize)]
struct StatusChange {
    id: String,
    status: CampaignStatus,
}

/// POST /api/campaigns/{id}/status
///
/// `id` is the platform campaign id.
async fn set_campaign_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ActionJson(input): ActionJson<StatusInput>,
) -> ActionResult<StatusChange> {
    let status: CampaignStatus = input.status.parse().map_err(ActionError::InvalidInput)?;
    let cred = credentials::load_account(state.db.as_ref(), &state.vault, user.user_id()).await?;

    state.api.update_object_status(&id, status, &cred.token).await?;

    let local = state.db.get_campaign_by_meta_id(&id).await?;
    if let Some(campaign) = &local {
        state.db.update_campaign_status(campaign.id, status).await?;
    }

    let name = local.map(|c| c.name).unwrap_or_else(|| id.clone());
    let verb = match status {
        CampaignStatus::Active => "Activated",
        CampaignStatus::Paused => "Paused",
    };
    record(
        &state,
        ActivityLog::new(
            user.user_id(),
            "update_status",
            format!("{verb} campaign \"{name}\""),
            "user",
        )
        .with_target(&id, &name),
    )
    .await;

    Ok(ActionResponse::ok(StatusChange { id, status }))
}

/// GET /api/campaigns/{id}/adsets
async fn list_ad_sets(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ActionResult<Vec<RemoteAdSet>> {
    let cred = credentials::load_account(state.db.as_ref(), &state.vault, user.user_id()).await?;
    let ad_sets = state.api.get_ad_sets_for_campaign(&id, &cred.token).await?;
    Ok(ActionResponse::ok(ad_sets))
}

/// GET /api/adsets/{id}/ads
async fn list_ads(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ActionResult<Vec<RemoteAd>> {
    let cred = credentials::load_account(state.db.as_ref(), &state.vault, user.user_id()).await?;
    let ads = state.api.get_ads_for_ad_set(&id, &cred.token).await?;
    Ok(ActionResponse::ok(ads))
}

#[derive(Debug, Deserialize)]
struct BudgetInput {
    object_id: String,
    /// Major currency units, e.g. `25.50`.
    amount: Decimal,
    #[serde(default = "default_budget_field")]
    field: BudgetField,
}

fn default_budget_field() -> BudgetField {
    BudgetField::DailyBudget
}

#[derive(Debug, Serialize)]
struct BudgetChange {
    object_id: String,
    field: BudgetField,
    cents: i64,
}

/// POST /api/budgets
async fn update_budget(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionJson(input): ActionJson<BudgetInput>,
) -> ActionResult<BudgetChange> {
    if input.amount <= Decimal::ZERO {
        return Err(ActionError::invalid("Budget must be greater than zero"));
    }
    let cents = budget_to_cents(input.amount)
        .ok_or_else(|| ActionError::invalid("Budget amount is out of range"))?;

    let cred = credentials::load_account(state.db.as_ref(), &state.vault, user.user_id()).await?;
    state
        .api
        .update_budget(&input.object_id, cents, input.field, &cred.token)
        .await?;

    record(
        &state,
        ActivityLog::new(
            user.user_id(),
            "update_budget",
            format!("Set {} to {}", input.field.as_str(), input.amount),
            "user",
        )
        .with_target(&input.object_id, &input.object_id)
        .with_metadata(serde_json::json!({ "cents": cents, "field": input.field })),
    )
    .await;

    Ok(ActionResponse::ok(BudgetChange {
        object_id: input.object_id,
        field: input.field,
        cents,
    }))
}

#[derive(Debug, Deserialize)]
struct InsightsParams {
    /// Defaults to the selected ad account.
    object_id: Option<String>,
    level: Option<InsightLevel>,
    from: Option<String>,
    to: Option<String>,
    date_preset: Option<String>,
    #[serde(default)]
    daily: bool,
}

/// GET /api/insights
async fn get_insights(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionQuery(params): ActionQuery<InsightsParams>,
) -> ActionResult<Vec<Insight>> {
    let cred = credentials::load_account(state.db.as_ref(), &state.vault, user.user_id()).await?;

    let mut query = InsightsQuery {
        level: params.level,
        date_preset: params.date_preset,
        ..Default::default()
    };
    match (params.from.as_deref(), params.to.as_deref()) {
        (Some(from), Some(to)) => {
            query = query.between(parse_date(from)?, parse_date(to)?);
        }
        (None, None) => {}
        _ => return Err(ActionError::invalid("Provide both 'from' and 'to', or neither")),
    }
    if params.daily {
        query = query.daily();
    }

    let object_id = params.object_id.unwrap_or(cred.ad_account_id);
    let insights = state.api.get_insights(&object_id, &cred.token, &query).await?;
    Ok(ActionResponse::ok(insights))
}

// ── Revenue ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RangeParams {
    from: Option<String>,
    to: Option<String>,
}

impl RangeParams {
    fn bounds(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>), ActionError> {
        let from = self.from.as_deref().map(parse_date).transpose()?;
        let to = self.to.as_deref().map(parse_date).transpose()?;
        Ok((from, to))
    }
}

/// GET /api/revenue
async fn list_revenue(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionQuery(range): ActionQuery<RangeParams>,
) -> ActionResult<Vec<ManualRevenue>> {
    let (from, to) = range.bounds()?;
    let (_, account) = credentials::selected_account(state.db.as_ref(), user.user_id()).await?;
    let entries = state.db.list_revenue(&account, from, to).await?;
    Ok(ActionResponse::ok(entries))
}

#[derive(Debug, Deserialize)]
struct RevenueInput {
    date: String,
    revenue: Decimal,
    #[serde(default)]
    sales_count: i64,
    #[serde(default)]
    unit_price: Decimal,
}

/// POST /api/revenue
///
/// Saving the same day twice overwrites the earlier entry.
async fn save_revenue(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionJson(input): ActionJson<RevenueInput>,
) -> ActionResult<ManualRevenue> {
    let date = parse_date(&input.date)?;
    if input.revenue < Decimal::ZERO || input.unit_price < Decimal::ZERO || input.sales_count < 0 {
        return Err(ActionError::invalid("Revenue values cannot be negative"));
    }

    let (_, account) = credentials::selected_account(state.db.as_ref(), user.user_id()).await?;
    let entry = ManualRevenue {
        ad_account_id: account,
        date,
        revenue: input.revenue,
        sales_count: input.sales_count,
        unit_price: input.unit_price,
    };
    state.db.upsert_revenue(&entry).await?;

    record(
        &state,
        ActivityLog::new(
            user.user_id(),
            "save_revenue",
            format!("Recorded revenue {} for {}", entry.revenue, entry.date),
            "user",
        ),
    )
    .await;
    Ok(ActionResponse::ok(entry))
}

/// DELETE /api/revenue/{date}
async fn delete_revenue(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(date): Path<String>,
) -> ActionResult<bool> {
    let date = parse_date(&date)?;
    let (_, account) = credentials::selected_account(state.db.as_ref(), user.user_id()).await?;
    let removed = state.db.delete_revenue(&account, date).await?;
    Ok(ActionResponse::ok(removed))
}

// ── Business context ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ContextParams {
    category: Option<ContextCategory>,
}

/// GET /api/context
async fn list_context(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionQuery(params): ActionQuery<ContextParams>,
) -> ActionResult<Vec<BusinessContext>> {
    let facts = state
        .db
        .list_context(user.user_id(), params.category)
        .await?;
    Ok(ActionResponse::ok(facts))
}

#[derive(Debug, Deserialize)]
struct ContextInput {
    content: String,
    #[serde(default = "default_category")]
    category: ContextCategory,
}

fn default_category() -> ContextCategory {
    ContextCategory::Context
}

/// POST /api/context
async fn add_context(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionJson(input): ActionJson<ContextInput>,
) -> ActionResult<BusinessContext> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(ActionError::invalid("Content cannot be empty"));
    }
    let fact = BusinessContext::new(user.user_id(), content, input.category);
    state.db.insert_context(&fact).await?;
    Ok(ActionResponse::ok(fact))
}

/// DELETE /api/context/{id}
async fn delete_context(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> ActionResult<bool> {
    let id = Uuid::parse_str(&id).map_err(|_| ActionError::invalid("Invalid context id"))?;
    let removed = state.db.delete_context(user.user_id(), id).await?;
    Ok(ActionResponse::ok(removed))
}

// ── Activity ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ActivityParams {
    limit: Option<usize>,
}

/// GET /api/activity
async fn list_activity(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionQuery(params): ActionQuery<ActivityParams>,
) -> ActionResult<Vec<ActivityLog>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let entries = state.db.list_activity(user.user_id(), limit).await?;
    Ok(ActionResponse::ok(entries))
}

// ── Creatives ───────────────────────────────────────────────────────

/// POST /api/creatives
async fn generate_creatives(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionJson(brief): ActionJson<CreativeBrief>,
) -> ActionResult<Vec<CreativeIdea>> {
    let generator = state
        .creative
        .as_ref()
        .ok_or_else(|| ActionError::Failed("Creative generation is not configured.".into()))?;
    let ideas = generator.generate(user.user_id(), &brief).await?;
    Ok(ActionResponse::ok(ideas))
}

// ── Dashboard ───────────────────────────────────────────────────────

/// GET /api/dashboard
///
/// Defaults to the last seven days ending today.
async fn get_dashboard(
    State(state): State<AppState>,
    user: CurrentUser,
    ActionQuery(range): ActionQuery<RangeParams>,
) -> ActionResult<DashboardSummary> {
    let (from, to) = range.bounds()?;
    let to = to.unwrap_or_else(|| Utc::now().date_naive());
    let from = from.unwrap_or(to - Duration::days(DEFAULT_DASHBOARD_DAYS - 1));
    if from > to {
        return Err(ActionError::invalid("'from' must not be after 'to'"));
    }

    let cred = credentials::load_account(state.db.as_ref(), &state.vault, user.user_id()).await?;
    let insights = state
        .api
        .get_insights(
            &cred.ad_account_id,
            &cred.token,
            &InsightsQuery::level(InsightLevel::Account).between(from, to),
        )
        .await?;
    let revenue = state
        .db
        .list_revenue(&cred.ad_account_id, Some(from), Some(to))
        .await?;

    let summary = dashboard::summarize(from, to, &insights, &revenue)
        .ok_or_else(|| ActionError::invalid("Totals for this range are out of range"))?;
    Ok(ActionResponse::ok(summary))
}

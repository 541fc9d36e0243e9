//! Unified `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::models::{
    ActivityLog, BusinessContext, Campaign, CampaignStatus, CampaignUpsert, ContextCategory,
    Integration, ManualRevenue, PerformanceMetric,
};

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Integrations ────────────────────────────────────────────────

    /// Insert or replace the integration for (user_id, platform).
    ///
    /// On conflict the existing row keeps its `id` and `created_at`.
    async fn upsert_integration(&self, integration: &Integration) -> Result<Integration, DatabaseError>;

    async fn get_integration(
        &self,
        user_id: &str,
        platform: &str,
    ) -> Result<Option<Integration>, DatabaseError>;

    async fn get_integration_by_id(&self, id: Uuid) -> Result<Option<Integration>, DatabaseError>;

    /// Point the integration at a different ad account.
    async fn set_integration_account(
        &self,
        user_id: &str,
        platform: &str,
        ad_account_id: &str,
    ) -> Result<bool, DatabaseError>;

    /// Remove the integration. Returns whether a row was deleted.
    async fn delete_integration(&self, user_id: &str, platform: &str) -> Result<bool, DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    async fn create_session(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// User id for a live (non-expired) session.
    async fn get_session_user(&self, token_hash: &str) -> Result<Option<String>, DatabaseError>;

    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError>;

    // ── Campaigns ───────────────────────────────────────────────────

    /// Insert or update a campaign keyed by `meta_campaign_id`.
    async fn upsert_campaign(&self, campaign: &CampaignUpsert) -> Result<Campaign, DatabaseError>;

    async fn get_campaign_by_meta_id(
        &self,
        meta_campaign_id: &str,
    ) -> Result<Option<Campaign>, DatabaseError>;

    async fn list_campaigns(&self, integration_id: Uuid) -> Result<Vec<Campaign>, DatabaseError>;

    /// Every ACTIVE campaign across all integrations.
    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>, DatabaseError>;

    async fn update_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), DatabaseError>;

    // ── Performance metrics ─────────────────────────────────────────

    async fn insert_metric(&self, metric: &PerformanceMetric) -> Result<(), DatabaseError>;

    /// The earliest stored metric row for a campaign.
    async fn first_metric(&self, campaign_id: Uuid) -> Result<Option<PerformanceMetric>, DatabaseError>;

    // ── Manual revenue ──────────────────────────────────────────────

    /// Insert or overwrite the entry for (ad_account_id, date).
    async fn upsert_revenue(&self, revenue: &ManualRevenue) -> Result<(), DatabaseError>;

    /// Entries for an account, oldest first, optionally bounded (inclusive).
    async fn list_revenue(
        &self,
        ad_account_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ManualRevenue>, DatabaseError>;

    async fn delete_revenue(&self, ad_account_id: &str, date: NaiveDate) -> Result<bool, DatabaseError>;

    // ── Business context ────────────────────────────────────────────

    async fn insert_context(&self, context: &BusinessContext) -> Result<(), DatabaseError>;

    async fn list_context(
        &self,
        user_id: &str,
        category: Option<ContextCategory>,
    ) -> Result<Vec<BusinessContext>, DatabaseError>;

    async fn delete_context(&self, user_id: &str, id: Uuid) -> Result<bool, DatabaseError>;

    // ── Activity log ────────────────────────────────────────────────

    async fn append_activity(&self, entry: &ActivityLog) -> Result<(), DatabaseError>;

    /// Most recent entries first.
    async fn list_activity(&self, user_id: &str, limit: usize) -> Result<Vec<ActivityLog>, DatabaseError>;
}

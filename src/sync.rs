//! Campaign sync: pull remote campaigns into the local cache.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::ads::{AdsApi, InsightLevel, InsightsQuery};
use crate::credentials;
use crate::error::SyncError;
use crate::store::{ActivityLog, CampaignStatus, CampaignUpsert, Database};
use crate::vault::CredentialVault;

/// Outcome of one sync run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    pub campaigns_synced: usize,
    pub insights_fetched: usize,
}

pub struct SyncService {
    db: Arc<dyn Database>,
    api: Arc<dyn AdsApi>,
    vault: CredentialVault,
}

impl SyncService {
    pub fn new(db: Arc<dyn Database>, api: Arc<dyn AdsApi>, vault: CredentialVault) -> Self {
        Self { db, api, vault }
    }

    /// Upsert every remote campaign of the user's selected account.
    ///
    /// The first failed upsert aborts the run. Rows already written stay.
    pub async fn sync_campaigns(&self, user_id: &str) -> Result<SyncReport, SyncError> {
        let cred = credentials::load_account(self.db.as_ref(), &self.vault, user_id).await?;

        let remote = self
            .api
            .get_campaigns(&cred.ad_account_id, &cred.token)
            .await?;
        debug!(account = %cred.ad_account_id, count = remote.len(), "Fetched remote campaigns");

        for campaign in &remote {
            let upsert = CampaignUpsert {
                integration_id: cred.integration.id,
                meta_campaign_id: campaign.id.clone(),
                name: campaign.name.clone(),
                status: CampaignStatus::from_remote(&campaign.status),
                objective: campaign.objective.clone(),
            };
            self.db
                .upsert_campaign(&upsert)
                .await
                .map_err(|source| SyncError::Upsert {
                    meta_campaign_id: campaign.id.clone(),
                    source,
                })?;
        }

        // TODO: persist per-day insights into performance_metrics once date-window aggregation lands
        let insights = self
            .api
            .get_insights(
                &cred.ad_account_id,
                &cred.token,
                &InsightsQuery::level(InsightLevel::Campaign),
            )
            .await?;

        let report = SyncReport {
            campaigns_synced: remote.len(),
            insights_fetched: insights.len(),
        };

        self.db
            .append_activity(
                &ActivityLog::new(
                    user_id,
                    "sync",
                    format!("Synced {} campaigns", report.campaigns_synced),
                    "sync",
                )
                .with_metadata(serde_json::json!({
                    "ad_account_id": cred.ad_account_id,
                    "campaigns": report.campaigns_synced,
                    "insights": report.insights_fetched,
                })),
            )
            .await?;

        info!(
            user_id,
            campaigns = report.campaigns_synced,
            insights = report.insights_fetched,
            "Campaign sync complete"
        );
        Ok(report)
    }
}

//! Optimization run: evaluate every active campaign and pause losers.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::rules::OptimizationRule;
use crate::ads::AdsApi;
use crate::credentials;
use crate::error::{CredentialError, OptimizerError};
use crate::store::{ActivityLog, CampaignStatus, Database};
use crate::vault::CredentialVault;

#[derive(Debug, Clone, Serialize)]
pub struct PausedCampaign {
    pub campaign_id: Uuid,
    pub meta_campaign_id: String,
    pub name: String,
    pub roas: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizationReport {
    /// Active campaigns that had a metric row to evaluate.
    pub evaluated: usize,
    pub paused: Vec<PausedCampaign>,
}

pub struct OptimizationEngine {
    db: Arc<dyn Database>,
    api: Arc<dyn AdsApi>,
    vault: CredentialVault,
    rule: OptimizationRule,
}

impl OptimizationEngine {
    pub fn new(
        db: Arc<dyn Database>,
        api: Arc<dyn AdsApi>,
        vault: CredentialVault,
        rule: OptimizationRule,
    ) -> Self {
        Self {
            db,
            api,
            vault,
            rule,
        }
    }

    /// Evaluate all active campaigns sequentially.
    ///
    /// The first error aborts the rest of the batch; campaigns already paused stay paused.
    pub async fn run(&self) -> Result<OptimizationReport, OptimizerError> {
        let campaigns = self.db.list_active_campaigns().await?;
        let mut report = OptimizationReport::default();

        for campaign in campaigns {
            // Reads the first stored row only; no date-window aggregation.
            let Some(metric) = self.db.first_metric(campaign.id).await? else {
                continue;
            };
            report.evaluated += 1;

            if !self.rule.should_pause(&metric) {
                debug!(campaign = %campaign.meta_campaign_id, roas = metric.roas, "Campaign within threshold");
                continue;
            }

            let integration = self
                .db
                .get_integration_by_id(campaign.integration_id)
                .await?
                .ok_or_else(|| OptimizerError::Credential {
                    campaign_id: campaign.id.to_string(),
                    source: CredentialError::CredentialMissing {
                        integration_id: campaign.integration_id.to_string(),
                    },
                })?;

            let token = credentials::unseal_token(&self.vault, &integration).map_err(|source| {
                OptimizerError::Credential {
                    campaign_id: campaign.id.to_string(),
                    source,
                }
            })?;

            self.api
                .update_object_status(&campaign.meta_campaign_id, CampaignStatus::Paused, &token)
                .await
                .map_err(|source| OptimizerError::Pause {
                    meta_campaign_id: campaign.meta_campaign_id.clone(),
                    source,
                })?;

            self.db
                .update_campaign_status(campaign.id, CampaignStatus::Paused)
                .await?;

            self.db
                .append_activity(
                    &ActivityLog::new(
                        &integration.user_id,
                        "pause_campaign",
                        format!(
                            "Paused \"{}\": ROAS {:.2} below {:.2}",
                            campaign.name, metric.roas, self.rule.min_roas
                        ),
                        "optimizer",
                    )
                    .with_target(&campaign.meta_campaign_id, &campaign.name)
                    .with_metadata(serde_json::json!({
                        "roas": metric.roas,
                        "min_roas": self.rule.min_roas,
                        "spend": metric.spend,
                    })),
                )
                .await?;

            info!(
                campaign = %campaign.meta_campaign_id,
                roas = metric.roas,
                "Paused underperforming campaign"
            );
            report.paused.push(PausedCampaign {
                campaign_id: campaign.id,
                meta_campaign_id: campaign.meta_campaign_id,
                name: campaign.name,
                roas: metric.roas,
            });
        }

        info!(
            evaluated = report.evaluated,
            paused = report.paused.len(),
            "Optimization run complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::fake::FakeAdsApi;
    use crate::store::{
        Campaign, CampaignUpsert, Integration, LibSqlBackend, PLATFORM_META, PerformanceMetric,
    };
    use rust_decimal::Decimal;

    struct Harness {
        db: Arc<dyn Database>,
        api: Arc<FakeAdsApi>,
        vault: CredentialVault,
        integration: Integration,
    }

    impl Harness {
        async fn new(api: FakeAdsApi) -> Self {
            let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
            let vault = CredentialVault::new([3u8; 32]);
            let integration = db
                .upsert_integration(
                    &Integration::new("u1", PLATFORM_META)
                        .with_account("act_1")
                        .with_token_ref(vault.encrypt("secret-token").unwrap()),
                )
                .await
                .unwrap();
            Self {
                db,
                api: Arc::new(api),
                vault,
                integration,
            }
        }

        fn engine(&self) -> OptimizationEngine {
            OptimizationEngine::new(
                Arc::clone(&self.db),
                self.api.clone(),
                self.vault.clone(),
                OptimizationRule::default(),
            )
        }

        async fn campaign(&self, meta_id: &str, roas: Option<f64>) -> Campaign {
            let campaign = self
                .db
                .upsert_campaign(&CampaignUpsert {
                    integration_id: self.integration.id,
                    meta_campaign_id: meta_id.to_string(),
                    name: format!("Campaign {meta_id}"),
                    status: CampaignStatus::Active,
                    objective: None,
                })
                .await
                .unwrap();
            if let Some(roas) = roas {
                self.db
                    .insert_metric(&PerformanceMetric::new(
                        campaign.id,
                        Decimal::ONE_HUNDRED,
                        25,
                        roas,
                    ))
                    .await
                    .unwrap();
            }
            campaign
        }

        async fn status(&self, meta_id: &str) -> CampaignStatus {
            self.db
                .get_campaign_by_meta_id(meta_id)
                .await
                .unwrap()
                .unwrap()
                .status
        }
    }

    #[tokio::test]
    async fn low_roas_is_paused_once() {
        let h = Harness::new(FakeAdsApi::default()).await;
        h.campaign("c1", Some(0.5)).await;

        let report = h.engine().run().await.unwrap();

        let calls = h.api.status_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "c1");
        assert_eq!(calls[0].1, CampaignStatus::Paused);
        assert_eq!(calls[0].2, "secret-token");
        assert_eq!(h.status("c1").await, CampaignStatus::Paused);
        assert_eq!(report.paused.len(), 1);

        let log = h.db.list_activity("u1", 5).await.unwrap();
        assert_eq!(log[0].agent, "optimizer");
        assert_eq!(log[0].target_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn healthy_roas_is_left_alone() {
        let h = Harness::new(FakeAdsApi::default()).await;
        h.campaign("c1", Some(1.5)).await;

        let report = h.engine().run().await.unwrap();

        assert!(h.api.status_calls().is_empty());
        assert_eq!(h.status("c1").await, CampaignStatus::Active);
        assert_eq!(report.evaluated, 1);
    }

    #[tokio::test]
    async fn zero_roas_is_not_paused() {
        let h = Harness::new(FakeAdsApi::default()).await;
        h.campaign("c1", Some(0.0)).await;

        h.engine().run().await.unwrap();

        assert!(h.api.status_calls().is_empty());
        assert_eq!(h.status("c1").await, CampaignStatus::Active);
    }

    #[tokio::test]
    async fn campaigns_without_metrics_are_skipped() {
        let h = Harness::new(FakeAdsApi::default()).await;
        h.campaign("c1", None).await;

        let report = h.engine().run().await.unwrap();
        assert_eq!(report.evaluated, 0);
        assert!(h.api.status_calls().is_empty());
    }

    #[tokio::test]
    async fn only_first_metric_row_counts() {
        let h = Harness::new(FakeAdsApi::default()).await;
        let campaign = h.campaign("c1", Some(1.5)).await;
        h.db
            .insert_metric(&PerformanceMetric::new(campaign.id, Decimal::ONE, 1, 0.2))
            .await
            .unwrap();

        h.engine().run().await.unwrap();
        assert!(h.api.status_calls().is_empty());
    }

    #[tokio::test]
    async fn remote_failure_aborts_batch() {
        let h = Harness::new(FakeAdsApi {
            fail_writes: Some("(#200) Permissions error".into()),
            ..Default::default()
        })
        .await;
        h.campaign("c1", Some(0.5)).await;
        h.campaign("c2", Some(0.4)).await;

        let err = h.engine().run().await.unwrap_err();
        assert!(matches!(err, OptimizerError::Pause { .. }));
        assert_eq!(h.status("c1").await, CampaignStatus::Active);
        assert_eq!(h.status("c2").await, CampaignStatus::Active);
    }

    #[tokio::test]
    async fn missing_credential_is_terminal() {
        let h = Harness::new(FakeAdsApi::default()).await;
        h.campaign("c1", Some(0.5)).await;
        h.db
            .upsert_integration(&Integration::new("u1", PLATFORM_META).with_account("act_1"))
            .await
            .unwrap();

        let err = h.engine().run().await.unwrap_err();
        assert!(matches!(
            err,
            OptimizerError::Credential {
                source: CredentialError::CredentialMissing { .. },
                ..
            }
        ));
        assert!(h.api.status_calls().is_empty());
    }
}

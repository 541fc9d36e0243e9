//! In-memory `AdsApi` that records writes, for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::AdsApi;
use super::types::{
    AdAccount, BudgetField, Insight, InsightsQuery, MetaUser, RemoteAd, RemoteAdSet,
    RemoteCampaign, TokenExchange,
};
use crate::error::AdsApiError;
use crate::store::CampaignStatus;

#[derive(Default)]
pub(crate) struct FakeAdsApi {
    pub campaigns: Vec<RemoteCampaign>,
    pub insights: Vec<Insight>,
    pub accounts: Vec<AdAccount>,
    /// When set, every write fails with this remote message.
    pub fail_writes: Option<String>,
    pub status_updates: Mutex<Vec<(String, CampaignStatus, String)>>,
    pub budget_updates: Mutex<Vec<(String, i64, BudgetField)>>,
}

impl FakeAdsApi {
    pub fn with_campaigns(campaigns: Vec<RemoteCampaign>) -> Self {
        Self {
            campaigns,
            ..Default::default()
        }
    }

    pub fn status_calls(&self) -> Vec<(String, CampaignStatus, String)> {
        self.status_updates.lock().unwrap().clone()
    }
}

pub(crate) fn remote_campaign(id: &str, name: &str, status: &str) -> RemoteCampaign {
    RemoteCampaign {
        id: id.to_string(),
        name: name.to_string(),
        status: status.to_string(),
        objective: Some("OUTCOME_SALES".to_string()),
        daily_budget: Some("5000".to_string()),
        lifetime_budget: None,
    }
}

#[async_trait]
impl AdsApi for FakeAdsApi {
    async fn get_campaigns(
        &self,
        _account_id: &str,
        _token: &SecretString,
    ) -> Result<Vec<RemoteCampaign>, AdsApiError> {
        Ok(self.campaigns.clone())
    }

    async fn get_ad_sets_for_campaign(
        &self,
        _campaign_id: &str,
        _token: &SecretString,
    ) -> Result<Vec<RemoteAdSet>, AdsApiError> {
        Ok(Vec::new())
    }

    async fn get_ads_for_ad_set(
        &self,
        _ad_set_id: &str,
        _token: &SecretString,
    ) -> Result<Vec<RemoteAd>, AdsApiError> {
        Ok(Vec::new())
    }

    async fn get_insights(
        &self,
        _object_id: &str,
        _token: &SecretString,
        _query: &InsightsQuery,
    ) -> Result<Vec<Insight>, AdsApiError> {
        Ok(self.insights.clone())
    }

    async fn update_object_status(
        &self,
        object_id: &str,
        status: CampaignStatus,
        token: &SecretString,
    ) -> Result<(), AdsApiError> {
        if let Some(msg) = &self.fail_writes {
            return Err(AdsApiError::remote(400, msg.clone()));
        }
        self.status_updates.lock().unwrap().push((
            object_id.to_string(),
            status,
            token.expose_secret().to_string(),
        ));
        Ok(())
    }

    async fn update_budget(
        &self,
        object_id: &str,
        cents: i64,
        field: BudgetField,
        _token: &SecretString,
    ) -> Result<(), AdsApiError> {
        if let Some(msg) = &self.fail_writes {
            return Err(AdsApiError::remote(400, msg.clone()));
        }
        self.budget_updates
            .lock()
            .unwrap()
            .push((object_id.to_string(), cents, field));
        Ok(())
    }

    async fn get_ad_accounts(&self, _token: &SecretString) -> Result<Vec<AdAccount>, AdsApiError> {
        Ok(self.accounts.clone())
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenExchange, AdsApiError> {
        Ok(TokenExchange {
            access_token: format!("short-{code}"),
            token_type: Some("bearer".into()),
            expires_in: Some(3600),
        })
    }

    async fn exchange_long_lived(&self, token: &SecretString) -> Result<TokenExchange, AdsApiError> {
        Ok(TokenExchange {
            access_token: format!("long-{}", token.expose_secret()),
            token_type: Some("bearer".into()),
            expires_in: Some(5_184_000),
        })
    }

    async fn get_me(&self, _token: &SecretString) -> Result<MetaUser, AdsApiError> {
        Ok(MetaUser {
            id: "meta_user_1".into(),
            name: Some("Test User".into()),
        })
    }
}

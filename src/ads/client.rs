//! Graph API client for the Marketing API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::AdsApi;
use super::types::{
    AdAccount, BudgetField, DataList, GraphErrorBody, Insight, InsightsQuery, MetaUser, RemoteAd,
    RemoteAdSet, RemoteCampaign, SuccessBody, TokenExchange,
};
use crate::config::MetaConfig;
use crate::error::AdsApiError;
use crate::store::CampaignStatus;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

const CAMPAIGN_FIELDS: &str = "id,name,status,objective,daily_budget,lifetime_budget";
const AD_SET_FIELDS: &str =
    "id,name,status,daily_budget,lifetime_budget,optimization_goal,billing_event,targeting";
const AD_FIELDS: &str = "id,name,status,creative{id,name,title,body,image_url,thumbnail_url}";
const INSIGHT_FIELDS: &str = "campaign_id,campaign_name,spend,impressions,clicks,ctr,cpc,actions,action_values,purchase_roas";
const AD_ACCOUNT_FIELDS: &str = "id,account_id,name,currency,account_status";

/// HTTP client for the Graph API.
#[derive(Clone)]
pub struct MetaAdsClient {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: SecretString,
}

impl std::fmt::Debug for MetaAdsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaAdsClient")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}

impl MetaAdsClient {
    pub fn new(config: &MetaConfig) -> Result<Self, AdsApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: config.graph_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &SecretString,
        params: &[(&str, String)],
    ) -> Result<T, AdsApiError> {
        debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token.expose_secret())
            .query(params)
            .send()
            .await?;
        parse_response(response).await
    }

    async fn post_form(
        &self,
        path: &str,
        token: &SecretString,
        form: &[(&str, String)],
    ) -> Result<(), AdsApiError> {
        debug!(path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token.expose_secret())
            .form(form)
            .send()
            .await?;
        let body: SuccessBody = parse_response(response).await?;
        if !body.success {
            return Err(AdsApiError::InvalidResponse(format!(
                "update of {path} was not acknowledged"
            )));
        }
        Ok(())
    }

    async fn oauth_token(&self, params: &[(&str, &str)]) -> Result<TokenExchange, AdsApiError> {
        let response = self
            .client
            .get(self.url("oauth/access_token"))
            .query(&[
                ("client_id", self.app_id.as_str()),
                ("client_secret", self.app_secret.expose_secret()),
            ])
            .query(params)
            .send()
            .await?;
        parse_response(response).await
    }
}

/// Decode a success body, or turn an error body into [`AdsApiError::Remote`].
async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AdsApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let preview: String = body.chars().take(MAX_LOG_BODY_CHARS).collect();
        if let Ok(parsed) = serde_json::from_str::<GraphErrorBody>(&body) {
            warn!(
                status = status.as_u16(),
                kind = parsed.error.kind.as_deref().unwrap_or("unknown"),
                code = parsed.error.code.unwrap_or_default(),
                "Graph API error: {}",
                parsed.error.message
            );
            return Err(AdsApiError::remote(status.as_u16(), parsed.error.message));
        }
        warn!(status = status.as_u16(), body = %preview, "Graph API error with unrecognised body");
        return Err(AdsApiError::remote(
            status.as_u16(),
            format!("Request failed with status {status}"),
        ));
    }

    serde_json::from_str(&body)
        .map_err(|e| AdsApiError::InvalidResponse(format!("failed to parse response: {e}")))
}

#[async_trait]
impl AdsApi for MetaAdsClient {
    async fn get_campaigns(
        &self,
        account_id: &str,
        token: &SecretString,
    ) -> Result<Vec<RemoteCampaign>, AdsApiError> {
        let account = super::normalize_account_id(account_id);
        let list: DataList<RemoteCampaign> = self
            .get_json(
                &format!("{account}/campaigns"),
                token,
                &[("fields", CAMPAIGN_FIELDS.to_string())],
            )
            .await?;
        Ok(list.data)
    }

    async fn get_ad_sets_for_campaign(
        &self,
        campaign_id: &str,
        token: &SecretString,
    ) -> Result<Vec<RemoteAdSet>, AdsApiError> {
        let list: DataList<RemoteAdSet> = self
            .get_json(
                &format!("{campaign_id}/adsets"),
                token,
                &[("fields", AD_SET_FIELDS.to_string())],
            )
            .await?;
        Ok(list.data)
    }

    async fn get_ads_for_ad_set(
        &self,
        ad_set_id: &str,
        token: &SecretString,
    ) -> Result<Vec<RemoteAd>, AdsApiError> {
        let list: DataList<RemoteAd> = self
            .get_json(
                &format!("{ad_set_id}/ads"),
                token,
                &[("fields", AD_FIELDS.to_string())],
            )
            .await?;
        Ok(list.data)
    }

    async fn get_insights(
        &self,
        object_id: &str,
        token: &SecretString,
        query: &InsightsQuery,
    ) -> Result<Vec<Insight>, AdsApiError> {
        let mut params = vec![("fields", INSIGHT_FIELDS.to_string())];
        params.extend(query.to_params());
        let list: DataList<Insight> = self
            .get_json(&format!("{object_id}/insights"), token, &params)
            .await?;
        Ok(list.data)
    }

    async fn update_object_status(
        &self,
        object_id: &str,
        status: CampaignStatus,
        token: &SecretString,
    ) -> Result<(), AdsApiError> {
        self.post_form(object_id, token, &[("status", status.as_str().to_string())])
            .await
    }

    async fn update_budget(
        &self,
        object_id: &str,
        cents: i64,
        field: BudgetField,
        token: &SecretString,
    ) -> Result<(), AdsApiError> {
        self.post_form(object_id, token, &[(field.as_str(), cents.to_string())])
            .await
    }

    async fn get_ad_accounts(&self, token: &SecretString) -> Result<Vec<AdAccount>, AdsApiError> {
        let list: DataList<AdAccount> = self
            .get_json(
                "me/adaccounts",
                token,
                &[("fields", AD_ACCOUNT_FIELDS.to_string())],
            )
            .await?;
        Ok(list.data)
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenExchange, AdsApiError> {
        self.oauth_token(&[("redirect_uri", redirect_uri), ("code", code)])
            .await
    }

    async fn exchange_long_lived(&self, token: &SecretString) -> Result<TokenExchange, AdsApiError> {
        self.oauth_token(&[
            ("grant_type", "fb_exchange_token"),
            ("fb_exchange_token", token.expose_secret()),
        ])
        .await
    }

    async fn get_me(&self, token: &SecretString) -> Result<MetaUser, AdsApiError> {
        self.get_json("me", token, &[("fields", "id,name".to_string())])
            .await
    }
}

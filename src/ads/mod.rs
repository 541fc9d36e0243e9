//! Advertising platform API: trait, Graph client, and wire types.

mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use secrecy::SecretString;

pub use client::MetaAdsClient;
pub use types::{
    AdAccount, BudgetField, Insight, InsightLevel, InsightsQuery, MetaUser, RemoteAd,
    RemoteAdSet, RemoteCampaign, TokenExchange,
};

use crate::error::AdsApiError;
use crate::store::CampaignStatus;

/// Read and write operations against the advertising platform.
///
/// Every call carries the caller's bearer token. Non-2xx responses become
/// [`AdsApiError::Remote`] with the platform's own message.
#[async_trait]
pub trait AdsApi: Send + Sync {
    async fn get_campaigns(
        &self,
        account_id: &str,
        token: &SecretString,
    ) -> Result<Vec<RemoteCampaign>, AdsApiError>;

    async fn get_ad_sets_for_campaign(
        &self,
        campaign_id: &str,
        token: &SecretString,
    ) -> Result<Vec<RemoteAdSet>, AdsApiError>;

    async fn get_ads_for_ad_set(
        &self,
        ad_set_id: &str,
        token: &SecretString,
    ) -> Result<Vec<RemoteAd>, AdsApiError>;

    /// Insights for an account, campaign, ad set or ad.
    async fn get_insights(
        &self,
        object_id: &str,
        token: &SecretString,
        query: &InsightsQuery,
    ) -> Result<Vec<Insight>, AdsApiError>;

    /// Set the delivery status of a campaign, ad set or ad.
    async fn update_object_status(
        &self,
        object_id: &str,
        status: CampaignStatus,
        token: &SecretString,
    ) -> Result<(), AdsApiError>;

    /// `cents` is in minor currency units; see [`budget_to_cents`].
    async fn update_budget(
        &self,
        object_id: &str,
        cents: i64,
        field: BudgetField,
        token: &SecretString,
    ) -> Result<(), AdsApiError>;

    async fn get_ad_accounts(&self, token: &SecretString) -> Result<Vec<AdAccount>, AdsApiError>;

    /// Trade an OAuth authorization code for a short-lived user token.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenExchange, AdsApiError>;

    /// Trade a short-lived user token for a long-lived one.
    async fn exchange_long_lived(&self, token: &SecretString) -> Result<TokenExchange, AdsApiError>;

    async fn get_me(&self, token: &SecretString) -> Result<MetaUser, AdsApiError>;
}

/// Ensure an ad account id carries the `act_` prefix.
pub fn normalize_account_id(id: &str) -> String {
    let id = id.trim();
    if id.starts_with("act_") {
        id.to_string()
    } else {
        format!("act_{id}")
    }
}

/// Convert a major-unit amount (e.g. dollars) to minor units, rounding to the nearest cent.
///
/// `None` when the result does not fit.
pub fn budget_to_cents(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn account_ids_are_prefixed_once() {
        assert_eq!(normalize_account_id("123"), "act_123");
        assert_eq!(normalize_account_id("act_123"), "act_123");
        assert_eq!(normalize_account_id(" 456 "), "act_456");
    }

    #[test]
    fn budgets_convert_to_minor_units() {
        assert_eq!(budget_to_cents(dec!(25)), Some(2500));
        assert_eq!(budget_to_cents(dec!(19.99)), Some(1999));
        assert_eq!(budget_to_cents(dec!(0.015)), Some(2));
        assert_eq!(budget_to_cents(Decimal::MAX), None);
        assert_eq!(budget_to_cents(dec!(100000000000000000)), None);
        assert_eq!(budget_to_cents(dec!(0.025)), Some(3));
        assert_eq!(budget_to_cents(Decimal::ZERO), Some(0));
    }
}

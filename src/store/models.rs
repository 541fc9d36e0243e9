//! Persisted domain records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform key for the Meta (Facebook/Instagram) ads integration.
pub const PLATFORM_META: &str = "meta";

/// Connection state of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationStatus {
    Active,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
        }
    }
}

impl FromStr for IntegrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            other => Err(format!("unknown integration status: {other}")),
        }
    }
}

/// A user's linked ad account and stored credential. One per (user, platform).
#[derive(Debug, Clone, Serialize)]
pub struct Integration {
    pub id: Uuid,
    pub user_id: String,
    pub platform: String,
    pub ad_account_id: Option<String>,
    /// Vault envelope, never the plaintext token.
    #[serde(skip_serializing)]
    pub access_token_ref: Option<String>,
    pub status: IntegrationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    pub fn new(user_id: impl Into<String>, platform: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            platform: platform.into(),
            ad_account_id: None,
            access_token_ref: None,
            status: IntegrationStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_account(mut self, ad_account_id: impl Into<String>) -> Self {
        self.ad_account_id = Some(ad_account_id.into());
        self
    }

    pub fn with_token_ref(mut self, access_token_ref: impl Into<String>) -> Self {
        self.access_token_ref = Some(access_token_ref.into());
        self
    }
}

/// Delivery status of a campaign. Anything the platform reports other than
/// `ACTIVE` (paused, archived, deleted, in review) is cached as `PAUSED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Active,
    Paused,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
        }
    }

    /// Map a platform status string onto the cached status.
    pub fn from_remote(s: &str) -> Self {
        if s.eq_ignore_ascii_case("ACTIVE") {
            Self::Active
        } else {
            Self::Paused
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "PAUSED" => Ok(Self::Paused),
            other => Err(format!("unknown campaign status: {other}")),
        }
    }
}

/// Local cache of a remote campaign, keyed by `meta_campaign_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Campaign {
    pub id: Uuid,
    pub integration_id: Uuid,
    pub meta_campaign_id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub objective: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by a campaign upsert.
#[derive(Debug, Clone)]
pub struct CampaignUpsert {
    pub integration_id: Uuid,
    pub meta_campaign_id: String,
    pub name: String,
    pub status: CampaignStatus,
    pub objective: Option<String>,
}

/// A cached performance sample for a campaign.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetric {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub spend: Decimal,
    pub clicks: i64,
    pub roas: f64,
    pub recorded_at: DateTime<Utc>,
}

impl PerformanceMetric {
    pub fn new(campaign_id: Uuid, spend: Decimal, clicks: i64, roas: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            spend,
            clicks,
            roas,
            recorded_at: Utc::now(),
        }
    }
}

/// Revenue entered by hand for one account and day. Unique on (account, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualRevenue {
    pub ad_account_id: String,
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub sales_count: i64,
    pub unit_price: Decimal,
}

/// Category of a business fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextCategory {
    Brand,
    Product,
    Audience,
    Competitor,
    Context,
    Links,
}

impl ContextCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brand => "brand",
            Self::Product => "product",
            Self::Audience => "audience",
            Self::Competitor => "competitor",
            Self::Context => "context",
            Self::Links => "links",
        }
    }
}

impl fmt::Display for ContextCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brand" => Ok(Self::Brand),
            "product" => Ok(Self::Product),
            "audience" => Ok(Self::Audience),
            "competitor" => Ok(Self::Competitor),
            "context" => Ok(Self::Context),
            "links" => Ok(Self::Links),
            other => Err(format!("unknown context category: {other}")),
        }
    }
}

/// A free-text business fact used as prompt context.
#[derive(Debug, Clone, Serialize)]
pub struct BusinessContext {
    pub id: Uuid,
    pub user_id: String,
    pub content: String,
    pub category: ContextCategory,
    pub created_at: DateTime<Utc>,
}

impl BusinessContext {
    pub fn new(user_id: impl Into<String>, content: impl Into<String>, category: ContextCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            content: content.into(),
            category,
            created_at: Utc::now(),
        }
    }
}

/// One entry of the append-only audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: String,
    pub action_type: String,
    pub description: String,
    pub target_id: Option<String>,
    pub target_name: Option<String>,
    /// Who acted: "user", "optimizer", "sync", "creative".
    pub agent: String,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn new(
        user_id: impl Into<String>,
        action_type: impl Into<String>,
        description: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            action_type: action_type.into(),
            description: description.into(),
            target_id: None,
            target_name: None,
            agent: agent.into(),
            status: "success".to_string(),
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_target(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.target_id = Some(id.into());
        self.target_name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_status_mapping() {
        assert_eq!(CampaignStatus::from_remote("ACTIVE"), CampaignStatus::Active);
        assert_eq!(CampaignStatus::from_remote("PAUSED"), CampaignStatus::Paused);
        assert_eq!(CampaignStatus::from_remote("ARCHIVED"), CampaignStatus::Paused);
        assert_eq!(CampaignStatus::from_remote("DELETED"), CampaignStatus::Paused);
    }

    #[test]
    fn campaign_status_serializes_uppercase() {
        let json = serde_json::to_string(&CampaignStatus::Paused).unwrap();
        assert_eq!(json, "\"PAUSED\"");
        assert_eq!("active".parse::<CampaignStatus>().unwrap(), CampaignStatus::Active);
    }

    #[test]
    fn context_category_roundtrip() {
        for cat in [
            ContextCategory::Brand,
            ContextCategory::Product,
            ContextCategory::Audience,
            ContextCategory::Competitor,
            ContextCategory::Context,
            ContextCategory::Links,
        ] {
            assert_eq!(cat.as_str().parse::<ContextCategory>().unwrap(), cat);
        }
        assert!("pricing".parse::<ContextCategory>().is_err());
    }

    #[test]
    fn integration_never_serializes_token_ref() {
        let integration = Integration::new("u1", PLATFORM_META).with_token_ref("v1:abc:def");
        let json = serde_json::to_string(&integration).unwrap();
        assert!(!json.contains("v1:abc:def"));
        assert!(!json.contains("access_token_ref"));
    }
}

//! Wire types for the Marketing (Graph) API.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Envelope for list endpoints: `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
pub(crate) struct DataList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphErrorBody {
    pub error: GraphError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

/// `{ "success": true }` returned by object updates.
#[derive(Debug, Deserialize)]
pub(crate) struct SuccessBody {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCampaign {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub objective: Option<String>,
    /// Minor currency units, as a string.
    #[serde(default)]
    pub daily_budget: Option<String>,
    #[serde(default)]
    pub lifetime_budget: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAdSet {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub daily_budget: Option<String>,
    #[serde(default)]
    pub lifetime_budget: Option<String>,
    #[serde(default)]
    pub optimization_goal: Option<String>,
    #[serde(default)]
    pub billing_event: Option<String>,
    #[serde(default)]
    pub targeting: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAd {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub creative: Option<RemoteCreative>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCreative {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// An `{action_type, value}` pair from `actions` / `action_values`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionStat {
    pub action_type: String,
    pub value: String,
}

/// One insights row. Numeric fields arrive as strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Insight {
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub spend: Option<String>,
    #[serde(default)]
    pub impressions: Option<String>,
    #[serde(default)]
    pub clicks: Option<String>,
    #[serde(default)]
    pub ctr: Option<String>,
    #[serde(default)]
    pub cpc: Option<String>,
    #[serde(default)]
    pub actions: Option<Vec<ActionStat>>,
    #[serde(default)]
    pub action_values: Option<Vec<ActionStat>>,
    #[serde(default)]
    pub purchase_roas: Option<Vec<ActionStat>>,
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(default)]
    pub date_stop: Option<String>,
}

impl Insight {
    pub fn spend(&self) -> Decimal {
        self.spend
            .as_deref()
            .and_then(|s| Decimal::from_str(s).ok())
            .unwrap_or_default()
    }

    pub fn clicks(&self) -> i64 {
        self.clicks
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdAccount {
    /// Prefixed id, e.g. `act_123`.
    pub id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub account_status: Option<i64>,
}

/// The authenticated platform user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Result of an OAuth code or long-lived token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchange {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Aggregation level for insights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightLevel {
    Account,
    Campaign,
    Adset,
    Ad,
}

impl InsightLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Campaign => "campaign",
            Self::Adset => "adset",
            Self::Ad => "ad",
        }
    }
}

/// Query options for [`AdsApi::get_insights`](super::AdsApi::get_insights).
#[derive(Debug, Clone, Default)]
pub struct InsightsQuery {
    pub level: Option<InsightLevel>,
    /// Named window such as `last_7d`. Ignored when `time_range` is set.
    pub date_preset: Option<String>,
    pub time_range: Option<(NaiveDate, NaiveDate)>,
    /// `Some(1)` returns one row per day.
    pub time_increment: Option<u32>,
}

impl InsightsQuery {
    pub fn level(level: InsightLevel) -> Self {
        Self {
            level: Some(level),
            ..Default::default()
        }
    }

    pub fn between(mut self, since: NaiveDate, until: NaiveDate) -> Self {
        self.time_range = Some((since, until));
        self
    }

    pub fn daily(mut self) -> Self {
        self.time_increment = Some(1);
        self
    }

    /// Query-string pairs for this request.
    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(level) = self.level {
            params.push(("level", level.as_str().to_string()));
        }
        match (&self.time_range, &self.date_preset) {
            (Some((since, until)), _) => params.push((
                "time_range",
                serde_json::json!({ "since": since.to_string(), "until": until.to_string() })
                    .to_string(),
            )),
            (None, Some(preset)) => params.push(("date_preset", preset.clone())),
            (None, None) => {}
        }
        if let Some(step) = self.time_increment {
            params.push(("time_increment", step.to_string()));
        }
        params
    }
}

/// Which budget an update targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetField {
    DailyBudget,
    LifetimeBudget,
}

impl BudgetField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DailyBudget => "daily_budget",
            Self::LifetimeBudget => "lifetime_budget",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insight_parses_string_numbers() {
        let insight: Insight = serde_json::from_value(serde_json::json!({
            "spend": "123.45",
            "clicks": "67",
            "purchase_roas": [{"action_type": "omni_purchase", "value": "2.5"}]
        }))
        .unwrap();

        assert_eq!(insight.spend(), dec!(123.45));
        assert_eq!(insight.clicks(), 67);
        assert_eq!(insight.purchase_roas.unwrap()[0].value, "2.5");
    }

    #[test]
    fn insight_missing_fields_default_to_zero() {
        let insight = Insight::default();
        assert_eq!(insight.spend(), Decimal::ZERO);
        assert_eq!(insight.clicks(), 0);
    }

    #[test]
    fn insights_query_prefers_time_range() {
        let query = InsightsQuery {
            level: Some(InsightLevel::Campaign),
            date_preset: Some("last_7d".into()),
            time_range: None,
            time_increment: None,
        }
        .between(
            NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 7).unwrap(),
        )
        .daily();

        let params = query.to_params();
        assert!(params.contains(&("level", "campaign".to_string())));
        assert!(params.iter().all(|(k, _)| *k != "date_preset"));
        let range = params.iter().find(|(k, _)| *k == "time_range").unwrap();
        assert!(range.1.contains("2026-10-01"));
        assert!(params.contains(&("time_increment", "1".to_string())));
    }

    #[test]
    fn list_envelope_tolerates_missing_data() {
        let list: DataList<RemoteCampaign> = serde_json::from_str("{}").unwrap();
        assert!(list.data.is_empty());
    }
}

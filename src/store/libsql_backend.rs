//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::models::{
    ActivityLog, BusinessContext, Campaign, CampaignStatus, CampaignUpsert, ContextCategory,
    Integration, IntegrationStatus, ManualRevenue, PerformanceMetric,
};
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run raw SQL against the connection.
    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(sql)
            .await
            .map(|_| ())
            .map_err(|e| DatabaseError::Query(format!("execute_batch: {e}")))
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str, column: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

fn parse_decimal(s: &str, column: &str) -> Result<Decimal, DatabaseError> {
    Decimal::from_str(s).map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

fn parse_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::Serialization(format!("date: {e}")))
}

fn col_err(idx: i32, e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(format!("column {idx}: {e}"))
}

fn col_text(row: &libsql::Row, idx: i32) -> Result<String, DatabaseError> {
    row.get::<String>(idx).map_err(|e| col_err(idx, e))
}

fn col_i64(row: &libsql::Row, idx: i32) -> Result<i64, DatabaseError> {
    row.get::<i64>(idx).map_err(|e| col_err(idx, e))
}

fn col_f64(row: &libsql::Row, idx: i32) -> Result<f64, DatabaseError> {
    row.get::<f64>(idx).map_err(|e| col_err(idx, e))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

const INTEGRATION_COLUMNS: &str =
    "id, user_id, platform, ad_account_id, access_token_ref, status, created_at, updated_at";

const CAMPAIGN_COLUMNS: &str =
    "id, integration_id, meta_campaign_id, name, status, objective, created_at, updated_at";

const METRIC_COLUMNS: &str = "id, campaign_id, spend, clicks, roas, recorded_at";

const REVENUE_COLUMNS: &str = "ad_account_id, date, revenue, sales_count, unit_price";

const CONTEXT_COLUMNS: &str = "id, user_id, content, category, created_at";

const ACTIVITY_COLUMNS: &str = "id, user_id, action_type, description, target_id, target_name, agent, status, metadata, created_at";

fn row_to_integration(row: &libsql::Row) -> Result<Integration, DatabaseError> {
    let status: String = col_text(row, 5)?;
    Ok(Integration {
        id: parse_uuid(&col_text(row, 0)?, "integrations.id")?,
        user_id: col_text(row, 1)?,
        platform: col_text(row, 2)?,
        ad_account_id: row.get(3).ok(),
        access_token_ref: row.get(4).ok(),
        status: status.parse().map_err(DatabaseError::Serialization)?,
        created_at: parse_datetime(&col_text(row, 6)?),
        updated_at: parse_datetime(&col_text(row, 7)?),
    })
}

fn row_to_campaign(row: &libsql::Row) -> Result<Campaign, DatabaseError> {
    let status: String = col_text(row, 4)?;
    Ok(Campaign {
        id: parse_uuid(&col_text(row, 0)?, "campaigns.id")?,
        integration_id: parse_uuid(&col_text(row, 1)?, "campaigns.integration_id")?,
        meta_campaign_id: col_text(row, 2)?,
        name: col_text(row, 3)?,
        status: CampaignStatus::from_remote(&status),
        objective: row.get(5).ok(),
        created_at: parse_datetime(&col_text(row, 6)?),
        updated_at: parse_datetime(&col_text(row, 7)?),
    })
}

fn row_to_metric(row: &libsql::Row) -> Result<PerformanceMetric, DatabaseError> {
    Ok(PerformanceMetric {
        id: parse_uuid(&col_text(row, 0)?, "performance_metrics.id")?,
        campaign_id: parse_uuid(&col_text(row, 1)?, "performance_metrics.campaign_id")?,
        spend: parse_decimal(&col_text(row, 2)?, "spend")?,
        clicks: col_i64(row, 3)?,
        roas: col_f64(row, 4)?,
        recorded_at: parse_datetime(&col_text(row, 5)?),
    })
}

fn row_to_revenue(row: &libsql::Row) -> Result<ManualRevenue, DatabaseError> {
    Ok(ManualRevenue {
        ad_account_id: col_text(row, 0)?,
        date: parse_date(&col_text(row, 1)?)?,
        revenue: parse_decimal(&col_text(row, 2)?, "revenue")?,
        sales_count: col_i64(row, 3)?,
        unit_price: parse_decimal(&col_text(row, 4)?, "unit_price")?,
    })
}

fn row_to_context(row: &libsql::Row) -> Result<BusinessContext, DatabaseError> {
    let category: String = col_text(row, 3)?;
    Ok(BusinessContext {
        id: parse_uuid(&col_text(row, 0)?, "business_context.id")?,
        user_id: col_text(row, 1)?,
        content: col_text(row, 2)?,
        category: category.parse().unwrap_or(ContextCategory::Context),
        created_at: parse_datetime(&col_text(row, 4)?),
    })
}

fn row_to_activity(row: &libsql::Row) -> Result<ActivityLog, DatabaseError> {
    let metadata: String = col_text(row, 8)?;
    Ok(ActivityLog {
        id: parse_uuid(&col_text(row, 0)?, "activity_log.id")?,
        user_id: col_text(row, 1)?,
        action_type: col_text(row, 2)?,
        description: col_text(row, 3)?,
        target_id: row.get(4).ok(),
        target_name: row.get(5).ok(),
        agent: col_text(row, 6)?,
        status: col_text(row, 7)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        created_at: parse_datetime(&col_text(row, 9)?),
    })
}

/// Drain a result set through a row mapper, skipping rows that fail to parse.
async fn collect_rows<T>(
    mut rows: libsql::Rows,
    map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    context: &str,
) -> Result<Vec<T>, DatabaseError> {
    let mut out = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{context}: {e}")))?
    {
        match map(&row) {
            Ok(item) => out.push(item),
            Err(e) => tracing::warn!(context, "Skipping row: {e}"),
        }
    }
    Ok(out)
}

/// Read at most one row through a row mapper.
async fn first_row<T>(
    mut rows: libsql::Rows,
    map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    context: &str,
) -> Result<Option<T>, DatabaseError> {
    match rows.next().await {
        Ok(Some(row)) => map(&row).map(Some),
        Ok(None) => Ok(None),
        Err(e) => Err(DatabaseError::Query(format!("{context}: {e}"))),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Integrations ────────────────────────────────────────────────

    async fn upsert_integration(&self, integration: &Integration) -> Result<Integration, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO integrations (id, user_id, platform, ad_account_id, access_token_ref, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (user_id, platform) DO UPDATE SET
                    ad_account_id = excluded.ad_account_id,
                    access_token_ref = excluded.access_token_ref,
                    status = excluded.status,
                    updated_at = excluded.updated_at",
                params![
                    integration.id.to_string(),
                    integration.user_id.as_str(),
                    integration.platform.as_str(),
                    opt_text(integration.ad_account_id.as_deref()),
                    opt_text(integration.access_token_ref.as_deref()),
                    integration.status.as_str(),
                    integration.created_at.to_rfc3339(),
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_integration: {e}")))?;

        debug!(user_id = %integration.user_id, platform = %integration.platform, "Integration upserted");

        self.get_integration(&integration.user_id, &integration.platform)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "integration".into(),
                id: integration.user_id.clone(),
            })
    }

    async fn get_integration(
        &self,
        user_id: &str,
        platform: &str,
    ) -> Result<Option<Integration>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE user_id = ?1 AND platform = ?2"
                ),
                params![user_id, platform],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_integration: {e}")))?;
        first_row(rows, row_to_integration, "get_integration").await
    }

    async fn get_integration_by_id(&self, id: Uuid) -> Result<Option<Integration>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_integration_by_id: {e}")))?;
        first_row(rows, row_to_integration, "get_integration_by_id").await
    }

    async fn set_integration_account(
        &self,
        user_id: &str,
        platform: &str,
        ad_account_id: &str,
    ) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE integrations SET ad_account_id = ?1, updated_at = ?2 WHERE user_id = ?3 AND platform = ?4",
                params![ad_account_id, Utc::now().to_rfc3339(), user_id, platform],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_integration_account: {e}")))?;
        Ok(count > 0)
    }

    async fn delete_integration(&self, user_id: &str, platform: &str) -> Result<bool, DatabaseError> {
        // Foreign keys are not enforced, so the cached campaigns and their
        // metrics go first.
        let owned = "SELECT id FROM integrations WHERE user_id = ?1 AND platform = ?2";
        self.conn()
            .execute(
                &format!(
                    "DELETE FROM performance_metrics WHERE campaign_id IN \
                     (SELECT id FROM campaigns WHERE integration_id IN ({owned}))"
                ),
                params![user_id, platform],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_integration metrics: {e}")))?;
        self.conn()
            .execute(
                &format!("DELETE FROM campaigns WHERE integration_id IN ({owned})"),
                params![user_id, platform],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_integration campaigns: {e}")))?;

        let count = self
            .conn()
            .execute(
                "DELETE FROM integrations WHERE user_id = ?1 AND platform = ?2",
                params![user_id, platform],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_integration: {e}")))?;
        Ok(count > 0)
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn create_session(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![token_hash, user_id, Utc::now().to_rfc3339(), expires_at.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_session: {e}")))?;
        Ok(())
    }

    async fn get_session_user(&self, token_hash: &str) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1",
                params![token_hash],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user_id: String = col_text(&row, 0)?;
                let expires_at = parse_datetime(&col_text(&row, 1)?);
                Ok((expires_at > Utc::now()).then_some(user_id))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session_user: {e}"))),
        }
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(())
    }

    // ── Campaigns ───────────────────────────────────────────────────

    async fn upsert_campaign(&self, campaign: &CampaignUpsert) -> Result<Campaign, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO campaigns (id, integration_id, meta_campaign_id, name, status, objective, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (meta_campaign_id) DO UPDATE SET
                    integration_id = excluded.integration_id,
                    name = excluded.name,
                    status = excluded.status,
                    objective = excluded.objective,
                    updated_at = excluded.updated_at",
                params![
                    Uuid::new_v4().to_string(),
                    campaign.integration_id.to_string(),
                    campaign.meta_campaign_id.as_str(),
                    campaign.name.as_str(),
                    campaign.status.as_str(),
                    opt_text(campaign.objective.as_deref()),
                    now
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_campaign: {e}")))?;

        debug!(meta_campaign_id = %campaign.meta_campaign_id, "Campaign upserted");

        self.get_campaign_by_meta_id(&campaign.meta_campaign_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "campaign".into(),
                id: campaign.meta_campaign_id.clone(),
            })
    }

    async fn get_campaign_by_meta_id(
        &self,
        meta_campaign_id: &str,
    ) -> Result<Option<Campaign>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE meta_campaign_id = ?1"),
                params![meta_campaign_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_campaign_by_meta_id: {e}")))?;
        first_row(rows, row_to_campaign, "get_campaign_by_meta_id").await
    }

    async fn list_campaigns(&self, integration_id: Uuid) -> Result<Vec<Campaign>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE integration_id = ?1 ORDER BY name ASC"
                ),
                params![integration_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_campaigns: {e}")))?;
        collect_rows(rows, row_to_campaign, "list_campaigns").await
    }

    async fn list_active_campaigns(&self) -> Result<Vec<Campaign>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CAMPAIGN_COLUMNS} FROM campaigns \
                     WHERE status = 'ACTIVE' AND integration_id IN (SELECT id FROM integrations) \
                     ORDER BY created_at ASC"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_active_campaigns: {e}")))?;
        collect_rows(rows, row_to_campaign, "list_active_campaigns").await
    }

    async fn update_campaign_status(
        &self,
        id: Uuid,
        status: CampaignStatus,
    ) -> Result<(), DatabaseError> {
        let count = self
            .conn()
            .execute(
                "UPDATE campaigns SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), Utc::now().to_rfc3339(), id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_campaign_status: {e}")))?;

        if count == 0 {
            return Err(DatabaseError::NotFound {
                entity: "campaign".into(),
                id: id.to_string(),
            });
        }
        debug!(campaign_id = %id, status = %status, "Campaign status updated");
        Ok(())
    }

    // ── Performance metrics ─────────────────────────────────────────

    async fn insert_metric(&self, metric: &PerformanceMetric) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO performance_metrics (id, campaign_id, spend, clicks, roas, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    metric.id.to_string(),
                    metric.campaign_id.to_string(),
                    metric.spend.to_string(),
                    metric.clicks,
                    metric.roas,
                    metric.recorded_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_metric: {e}")))?;
        Ok(())
    }

    async fn first_metric(&self, campaign_id: Uuid) -> Result<Option<PerformanceMetric>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {METRIC_COLUMNS} FROM performance_metrics WHERE campaign_id = ?1 ORDER BY rowid ASC LIMIT 1"
                ),
                params![campaign_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("first_metric: {e}")))?;
        first_row(rows, row_to_metric, "first_metric").await
    }

    // ── Manual revenue ──────────────────────────────────────────────

    async fn upsert_revenue(&self, revenue: &ManualRevenue) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO manual_revenue (ad_account_id, date, revenue, sales_count, unit_price, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (ad_account_id, date) DO UPDATE SET
                    revenue = excluded.revenue,
                    sales_count = excluded.sales_count,
                    unit_price = excluded.unit_price,
                    updated_at = excluded.updated_at",
                params![
                    revenue.ad_account_id.as_str(),
                    revenue.date.to_string(),
                    revenue.revenue.to_string(),
                    revenue.sales_count,
                    revenue.unit_price.to_string(),
                    Utc::now().to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_revenue: {e}")))?;
        Ok(())
    }

    async fn list_revenue(
        &self,
        ad_account_id: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<ManualRevenue>, DatabaseError> {
        let from = from.map(|d| d.to_string());
        let to = to.map(|d| d.to_string());
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {REVENUE_COLUMNS} FROM manual_revenue
                     WHERE ad_account_id = ?1 AND (?2 IS NULL OR date >= ?2) AND (?3 IS NULL OR date <= ?3)
                     ORDER BY date ASC"
                ),
                params![ad_account_id, opt_text(from.as_deref()), opt_text(to.as_deref())],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_revenue: {e}")))?;
        collect_rows(rows, row_to_revenue, "list_revenue").await
    }

    async fn delete_revenue(&self, ad_account_id: &str, date: NaiveDate) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM manual_revenue WHERE ad_account_id = ?1 AND date = ?2",
                params![ad_account_id, date.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_revenue: {e}")))?;
        Ok(count > 0)
    }

    // ── Business context ────────────────────────────────────────────

    async fn insert_context(&self, context: &BusinessContext) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO business_context (id, user_id, content, category, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    context.id.to_string(),
                    context.user_id.as_str(),
                    context.content.as_str(),
                    context.category.as_str(),
                    context.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_context: {e}")))?;
        Ok(())
    }

    async fn list_context(
        &self,
        user_id: &str,
        category: Option<ContextCategory>,
    ) -> Result<Vec<BusinessContext>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {CONTEXT_COLUMNS} FROM business_context
                     WHERE user_id = ?1 AND (?2 IS NULL OR category = ?2)
                     ORDER BY created_at ASC"
                ),
                params![user_id, opt_text(category.as_ref().map(ContextCategory::as_str))],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_context: {e}")))?;
        collect_rows(rows, row_to_context, "list_context").await
    }

    async fn delete_context(&self, user_id: &str, id: Uuid) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute(
                "DELETE FROM business_context WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_context: {e}")))?;
        Ok(count > 0)
    }

    // ── Activity log ────────────────────────────────────────────────

    async fn append_activity(&self, entry: &ActivityLog) -> Result<(), DatabaseError> {
        let metadata = serde_json::to_string(&entry.metadata)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO activity_log ({ACTIVITY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    entry.id.to_string(),
                    entry.user_id.as_str(),
                    entry.action_type.as_str(),
                    entry.description.as_str(),
                    opt_text(entry.target_id.as_deref()),
                    opt_text(entry.target_name.as_deref()),
                    entry.agent.as_str(),
                    entry.status.as_str(),
                    metadata,
                    entry.created_at.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("append_activity: {e}")))?;
        Ok(())
    }

    async fn list_activity(&self, user_id: &str, limit: usize) -> Result<Vec<ActivityLog>, DatabaseError> {
        let rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM activity_log WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
                ),
                params![user_id, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_activity: {e}")))?;
        collect_rows(rows, row_to_activity, "list_activity").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::PLATFORM_META;
    use rust_decimal_macros::dec;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    async fn seed_integration(db: &LibSqlBackend) -> Integration {
        db.upsert_integration(
            &Integration::new("user_1", PLATFORM_META)
                .with_account("act_123")
                .with_token_ref("v1:nonce:cipher"),
        )
        .await
        .unwrap()
    }

    fn upsert(integration_id: Uuid, meta_id: &str, name: &str, status: CampaignStatus) -> CampaignUpsert {
        CampaignUpsert {
            integration_id,
            meta_campaign_id: meta_id.to_string(),
            name: name.to_string(),
            status,
            objective: Some("OUTCOME_SALES".to_string()),
        }
    }

    fn revenue(date: &str, amount: Decimal, sales: i64) -> ManualRevenue {
        ManualRevenue {
            ad_account_id: "act_123".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            revenue: amount,
            sales_count: sales,
            unit_price: dec!(25.00),
        }
    }

    // ── Integrations ────────────────────────────────────────────────

    #[tokio::test]
    async fn integration_upsert_and_get() {
        let db = test_db().await;
        let stored = seed_integration(&db).await;

        assert_eq!(stored.user_id, "user_1");
        assert_eq!(stored.ad_account_id.as_deref(), Some("act_123"));
        assert_eq!(stored.access_token_ref.as_deref(), Some("v1:nonce:cipher"));
        assert_eq!(stored.status, IntegrationStatus::Active);

        let by_id = db.get_integration_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(by_id.user_id, "user_1");
    }

    #[tokio::test]
    async fn integration_upsert_keeps_one_row_per_user_platform() {
        let db = test_db().await;
        let first = seed_integration(&db).await;

        let reconnect = Integration::new("user_1", PLATFORM_META)
            .with_account("act_999")
            .with_token_ref("v1:new:token");
        let second = db.upsert_integration(&reconnect).await.unwrap();

        assert_eq!(second.id, first.id, "reconnect must update, not duplicate");
        assert_eq!(second.ad_account_id.as_deref(), Some("act_999"));
        assert_eq!(second.access_token_ref.as_deref(), Some("v1:new:token"));
    }

    #[tokio::test]
    async fn integration_switch_account_and_delete() {
        let db = test_db().await;
        seed_integration(&db).await;

        assert!(db.set_integration_account("user_1", PLATFORM_META, "act_456").await.unwrap());
        let fetched = db.get_integration("user_1", PLATFORM_META).await.unwrap().unwrap();
        assert_eq!(fetched.ad_account_id.as_deref(), Some("act_456"));

        assert!(db.delete_integration("user_1", PLATFORM_META).await.unwrap());
        assert!(db.get_integration("user_1", PLATFORM_META).await.unwrap().is_none());
        assert!(!db.delete_integration("user_1", PLATFORM_META).await.unwrap());
    }

    #[tokio::test]
    async fn integration_without_account_or_token() {
        let db = test_db().await;
        let stored = db
            .upsert_integration(&Integration::new("user_2", PLATFORM_META))
            .await
            .unwrap();
        assert!(stored.ad_account_id.is_none());
        assert!(stored.access_token_ref.is_none());
    }

    // ── Sessions ────────────────────────────────────────────────────

    #[tokio::test]
    async fn session_lookup_respects_expiry() {
        let db = test_db().await;
        db.create_session("live", "user_1", Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        db.create_session("stale", "user_1", Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(db.get_session_user("live").await.unwrap().as_deref(), Some("user_1"));
        assert!(db.get_session_user("stale").await.unwrap().is_none());
        assert!(db.get_session_user("missing").await.unwrap().is_none());

        db.delete_session("live").await.unwrap();
        assert!(db.get_session_user("live").await.unwrap().is_none());
    }

    // ── Campaigns ───────────────────────────────────────────────────

    #[tokio::test]
    async fn campaign_upsert_is_keyed_by_external_id() {
        let db = test_db().await;
        let integration = seed_integration(&db).await;

        let first = db
            .upsert_campaign(&upsert(integration.id, "c_1", "Spring Sale", CampaignStatus::Active))
            .await
            .unwrap();
        let second = db
            .upsert_campaign(&upsert(integration.id, "c_1", "Spring Sale v2", CampaignStatus::Paused))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Spring Sale v2");
        assert_eq!(second.status, CampaignStatus::Paused);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(db.list_campaigns(integration.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_active_campaigns_filters_status() {
        let db = test_db().await;
        let integration = seed_integration(&db).await;
        db.upsert_campaign(&upsert(integration.id, "c_1", "A", CampaignStatus::Active))
            .await
            .unwrap();
        db.upsert_campaign(&upsert(integration.id, "c_2", "B", CampaignStatus::Paused))
            .await
            .unwrap();

        let active = db.list_active_campaigns().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].meta_campaign_id, "c_1");
    }

    #[tokio::test]
    async fn deleting_integration_drops_its_campaigns() {
        let db = test_db().await;
        let integration = seed_integration(&db).await;
        let campaign = db
            .upsert_campaign(&upsert(integration.id, "c_1", "A", CampaignStatus::Active))
            .await
            .unwrap();
        db.insert_metric(&PerformanceMetric::new(campaign.id, Decimal::ONE, 1, 0.5))
            .await
            .unwrap();

        assert!(db.delete_integration("user_1", PLATFORM_META).await.unwrap());

        assert!(db.get_campaign_by_meta_id("c_1").await.unwrap().is_none());
        assert!(db.first_metric(campaign.id).await.unwrap().is_none());
        assert!(db.list_active_campaigns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn orphaned_campaigns_are_not_active() {
        let db = test_db().await;
        db.upsert_campaign(&upsert(Uuid::new_v4(), "c_orphan", "A", CampaignStatus::Active))
            .await
            .unwrap();
        assert!(db.list_active_campaigns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_campaign_status_mirrors_locally() {
        let db = test_db().await;
        let integration = seed_integration(&db).await;
        let campaign = db
            .upsert_campaign(&upsert(integration.id, "c_1", "A", CampaignStatus::Active))
            .await
            .unwrap();

        db.update_campaign_status(campaign.id, CampaignStatus::Paused)
            .await
            .unwrap();
        let fetched = db.get_campaign_by_meta_id("c_1").await.unwrap().unwrap();
        assert_eq!(fetched.status, CampaignStatus::Paused);

        let missing = db.update_campaign_status(Uuid::new_v4(), CampaignStatus::Paused).await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    // ── Metrics ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn first_metric_returns_earliest_row() {
        let db = test_db().await;
        let integration = seed_integration(&db).await;
        let campaign = db
            .upsert_campaign(&upsert(integration.id, "c_1", "A", CampaignStatus::Active))
            .await
            .unwrap();

        assert!(db.first_metric(campaign.id).await.unwrap().is_none());

        db.insert_metric(&PerformanceMetric::new(campaign.id, dec!(100.50), 40, 0.5))
            .await
            .unwrap();
        db.insert_metric(&PerformanceMetric::new(campaign.id, dec!(80), 30, 2.5))
            .await
            .unwrap();

        let first = db.first_metric(campaign.id).await.unwrap().unwrap();
        assert_eq!(first.spend, dec!(100.50));
        assert_eq!(first.clicks, 40);
        assert!((first.roas - 0.5).abs() < f64::EPSILON);
    }

    // ── Revenue ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn revenue_upsert_overwrites_same_day() {
        let db = test_db().await;
        db.upsert_revenue(&revenue("2026-10-01", dec!(100), 4)).await.unwrap();
        db.upsert_revenue(&revenue("2026-10-01", dec!(250.75), 10)).await.unwrap();

        let rows = db.list_revenue("act_123", None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].revenue, dec!(250.75));
        assert_eq!(rows[0].sales_count, 10);
    }

    #[tokio::test]
    async fn revenue_list_date_filter_and_delete() {
        let db = test_db().await;
        for day in ["2026-10-01", "2026-10-02", "2026-10-03", "2026-10-04"] {
            db.upsert_revenue(&revenue(day, dec!(10), 1)).await.unwrap();
        }

        let from = NaiveDate::from_ymd_opt(2026, 10, 2);
        let to = NaiveDate::from_ymd_opt(2026, 10, 3);
        let window = db.list_revenue("act_123", from, to).await.unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].date.to_string(), "2026-10-02");

        let open_ended = db.list_revenue("act_123", from, None).await.unwrap();
        assert_eq!(open_ended.len(), 3);

        assert!(db.delete_revenue("act_123", from.unwrap()).await.unwrap());
        assert_eq!(db.list_revenue("act_123", None, None).await.unwrap().len(), 3);
        assert!(db.list_revenue("act_other", None, None).await.unwrap().is_empty());
    }

    // ── Business context ────────────────────────────────────────────

    #[tokio::test]
    async fn context_crud_scoped_by_user() {
        let db = test_db().await;
        let brand = BusinessContext::new("user_1", "Eco-friendly sneakers", ContextCategory::Brand);
        let audience = BusinessContext::new("user_1", "Runners 25-40", ContextCategory::Audience);
        db.insert_context(&brand).await.unwrap();
        db.insert_context(&audience).await.unwrap();
        db.insert_context(&BusinessContext::new("user_2", "Other", ContextCategory::Brand))
            .await
            .unwrap();

        assert_eq!(db.list_context("user_1", None).await.unwrap().len(), 2);
        let brands = db.list_context("user_1", Some(ContextCategory::Brand)).await.unwrap();
        assert_eq!(brands.len(), 1);
        assert_eq!(brands[0].content, "Eco-friendly sneakers");

        assert!(!db.delete_context("user_2", brand.id).await.unwrap());
        assert!(db.delete_context("user_1", brand.id).await.unwrap());
        assert_eq!(db.list_context("user_1", None).await.unwrap().len(), 1);
    }

    // ── Activity ────────────────────────────────────────────────────

    #[tokio::test]
    async fn activity_append_and_list_newest_first() {
        let db = test_db().await;
        db.append_activity(&ActivityLog::new("user_1", "sync", "Synced 3 campaigns", "sync"))
            .await
            .unwrap();
        db.append_activity(
            &ActivityLog::new("user_1", "pause_campaign", "Paused low ROAS", "optimizer")
                .with_target("c_1", "Spring Sale")
                .with_metadata(serde_json::json!({"roas": 0.5})),
        )
        .await
        .unwrap();

        let entries = db.list_activity("user_1", 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action_type, "pause_campaign");
        assert_eq!(entries[0].target_name.as_deref(), Some("Spring Sale"));
        assert_eq!(entries[0].metadata["roas"], 0.5);
        assert!(entries[1].target_id.is_none());

        assert_eq!(db.list_activity("user_1", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_local_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("adpilot.db");
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
        drop(db);
    }
}

//! Persistence layer: libSQL-backed storage for integrations, campaigns,
//! revenue, business context, sessions and the activity log.

pub mod libsql_backend;
pub mod migrations;
pub mod models;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use models::{
    ActivityLog, BusinessContext, Campaign, CampaignStatus, CampaignUpsert, ContextCategory,
    Integration, IntegrationStatus, ManualRevenue, PLATFORM_META, PerformanceMetric,
};
pub use traits::Database;

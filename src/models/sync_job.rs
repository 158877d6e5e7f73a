//! SyncJob entity model
//!
//! Units of sync work (backfill, daily, on-demand) claimed by the worker
//! pool through the atomic claim protocol.

use super::tenant::Entity as Tenant;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::ActiveModelBehavior;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Kinds of sync jobs
pub const KIND_BACKFILL: &str = "backfill";
pub const KIND_DAILY_SYNC: &str = "daily_sync";
pub const KIND_ON_DEMAND: &str = "on_demand";

/// Job statuses shared by both queues
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

/// Default priorities per job kind
pub const PRIORITY_BACKFILL: i16 = 100;
pub const PRIORITY_ON_DEMAND: i16 = 75;
pub const PRIORITY_DAILY: i16 = 50;

/// SyncJob entity representing a queued pull of platform data
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_jobs")]
pub struct Model {
    /// Unique identifier for the sync job (primary key)
    #[sea_orm(primary_key)]
    pub id: Uuid,

    /// Tenant the job pulls data for
    pub tenant_id: Uuid,

    /// Platform key the job syncs against
    pub platform: String,

    /// Job kind: backfill, daily_sync, or on_demand
    pub kind: String,

    /// Current status: pending, processing, completed, or failed
    pub status: String,

    /// Priority for claiming (higher values claimed first)
    pub priority: i16,

    /// Number of attempts made, including the in-flight one
    pub attempts: i32,

    /// Identity of the worker that claimed the job
    pub claimed_by: Option<String>,

    /// When the job was claimed; stale claims become reclaimable
    pub claimed_at: Option<DateTimeWithTimeZone>,

    /// Earliest time the job may next be claimed (retry backoff)
    pub run_after: Option<DateTimeWithTimeZone>,

    /// When the job reached a terminal status
    pub finished_at: Option<DateTimeWithTimeZone>,

    /// Structured error details from the most recent failure
    #[sea_orm(column_type = "JsonBinary")]
    pub error: Option<JsonValue>,

    /// Timestamp when the job was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the job was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Tenant",
        from = "Column::TenantId",
        to = "super::tenant::Column::Id"
    )]
    Tenant,
}

impl Related<Tenant> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

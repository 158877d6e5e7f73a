//! EnrichmentJob entity model
//!
//! One job per synced content item awaiting AI-derived augmentation.
//! Unique on (tenant_id, content_id, content_type) so re-enqueuing a queued
//! item is a no-op.

use super::tenant::Entity as Tenant;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::ActiveModelBehavior;
use uuid::Uuid;

/// EnrichmentJob entity referencing a content item to enrich
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "enrichment_jobs")]
pub struct Model {
    /// Unique identifier for the enrichment job (primary key)
    #[sea_orm(primary_key)]
    pub id: Uuid,

    /// Tenant that owns the referenced content
    pub tenant_id: Uuid,

    /// Content item the job enriches
    pub content_id: Uuid,

    /// Content-type tag of the referenced item (e.g. "post")
    pub content_type: String,

    /// Current status: pending, processing, completed, or failed
    pub status: String,

    /// Number of attempts made, including the in-flight one
    pub attempts: i32,

    /// Message from the most recent failure
    pub error_message: Option<String>,

    /// Identity of the worker that claimed the job
    pub claimed_by: Option<String>,

    /// When the job was claimed; stale claims become reclaimable
    pub claimed_at: Option<DateTimeWithTimeZone>,

    /// Earliest time the job may next be claimed (whole-interval backoff)
    pub run_after: Option<DateTimeWithTimeZone>,

    /// When the job reached a terminal status
    pub finished_at: Option<DateTimeWithTimeZone>,

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

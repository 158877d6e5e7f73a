//! ContentItem entity model
//!
//! Synced platform content with enrichment output (transcript, embedding)
//! written back in place once derived.

use super::tenant::Entity as Tenant;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::ActiveModelBehavior;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Content item pulled from a platform during sync
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "content_items")]
pub struct Model {
    /// Unique identifier for the content item (primary key)
    #[sea_orm(primary_key)]
    pub id: Uuid,

    /// Tenant that owns the content
    pub tenant_id: Uuid,

    /// Platform the content came from
    pub platform: String,

    /// Platform-side identifier, unique per (tenant, platform)
    pub external_id: String,

    /// Content-type tag (e.g. "post", "campaign", "task")
    pub kind: String,

    /// Raw platform payload (caption, media urls, metrics)
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: JsonValue,

    /// Derived text transcript, if enrichment produced one
    pub transcript: Option<String>,

    /// Derived semantic vector (JSON array of floats)
    #[sea_orm(column_type = "JsonBinary")]
    pub embedding: Option<JsonValue>,

    /// When enrichment last wrote derived fields
    pub enriched_at: Option<DateTimeWithTimeZone>,

    /// When the sync worker last saw this item upstream
    pub synced_at: DateTimeWithTimeZone,

    /// Timestamp when the item was first stored
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the item was last updated
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

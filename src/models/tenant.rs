//! Tenant entity model
//!
//! The client registry: each tenant carries its private delivery endpoint
//! and the shared secret used to authenticate the broker to it.

use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::ActiveModelBehavior;

/// Tenant entry mapping a tenant to its delivery endpoint and shared secret
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Unique identifier for the tenant (primary key)
    #[sea_orm(primary_key)]
    pub id: Uuid,

    /// Display name for the tenant (optional)
    pub name: Option<String>,

    /// Tenant-side endpoint credentials are delivered to
    pub endpoint_url: String,

    /// Shared secret used to sign deliveries to the tenant endpoint
    pub shared_secret: String,

    /// Timestamp when the tenant was registered
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the tenant was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

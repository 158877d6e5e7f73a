//! Credential entity model
//!
//! One record per (tenant, platform). Token material is ciphertext produced
//! by the vault; only the credential repository decrypts it.

use super::tenant::Entity as Tenant;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::ActiveModelBehavior;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Credential record holding encrypted token material for a tenant/platform pair
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "credentials")]
pub struct Model {
    /// Unique identifier for the credential (primary key)
    #[sea_orm(primary_key)]
    pub id: Uuid,

    /// Tenant that owns this credential
    pub tenant_id: Uuid,

    /// Platform key (e.g. "meta", "google", "asana")
    pub platform: String,

    /// Encrypted access secret
    pub access_secret_ciphertext: Vec<u8>,

    /// Encrypted refresh secret (absent for platforms without refresh)
    pub refresh_secret_ciphertext: Option<Vec<u8>>,

    /// Absolute expiry; null for platforms whose tokens never expire
    pub expires_at: Option<DateTimeWithTimeZone>,

    /// Granted scope names (JSON array)
    #[sea_orm(column_type = "JsonBinary")]
    pub scopes: Option<JsonValue>,

    /// Platform-specific opaque metadata (discovered account ids etc.)
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Option<JsonValue>,

    /// Last time the refresh path replaced the token material
    pub last_refreshed_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the credential was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the credential was last updated
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

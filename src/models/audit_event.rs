//! AuditEvent entity model
//!
//! Append-only record of OAuth transitions, deliveries, and token reads.

use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::ActiveModelBehavior;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Audit stages
pub const STAGE_AUTHORIZE: &str = "authorize";
pub const STAGE_CALLBACK: &str = "callback";
pub const STAGE_EXCHANGE: &str = "exchange";
pub const STAGE_DELIVER: &str = "deliver";
pub const STAGE_TOKEN_READ: &str = "token_read";

/// Audit outcomes
pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_FAILURE: &str = "failure";

/// Single audit trail entry
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_events")]
pub struct Model {
    /// Unique identifier for the event (primary key)
    #[sea_orm(primary_key)]
    pub id: Uuid,

    /// Tenant involved; null when the state token could not be recovered
    pub tenant_id: Option<Uuid>,

    /// Platform involved, if known
    pub platform: Option<String>,

    /// Transition stage (authorize, callback, exchange, deliver, token_read)
    pub stage: String,

    /// success or failure
    pub outcome: String,

    /// Structured context (error kinds, attempt counts)
    #[sea_orm(column_type = "JsonBinary")]
    pub detail: Option<JsonValue>,

    /// Timestamp when the event was recorded
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

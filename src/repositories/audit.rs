//! # Audit Repository
//!
//! Append-only writer for the audit_events table. Every OAuth transition,
//! delivery attempt, and token read leaves a row here, success or failure.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::audit_event::{ActiveModel, Column, Entity, Model};

/// Repository for audit event database operations
#[derive(Clone)]
pub struct AuditRepository {
    db: DatabaseConnection,
}

impl AuditRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Append an audit event. `tenant_id` is absent when the event predates
    /// state recovery (e.g. a tampered callback).
    pub async fn record(
        &self,
        tenant_id: Option<Uuid>,
        platform: Option<&str>,
        stage: &str,
        outcome: &str,
        detail: Option<JsonValue>,
    ) -> Result<Model, ApiError> {
        let id = Uuid::new_v4();
        let event = ActiveModel {
            id: Set(id),
            tenant_id: Set(tenant_id),
            platform: Set(platform.map(str::to_string)),
            stage: Set(stage.to_string()),
            outcome: Set(outcome.to_string()),
            detail: Set(detail),
            created_at: Set(Utc::now().fixed_offset()),
        };

        match event.insert(&self.db).await {
            Ok(model) => return Ok(model),
            Err(DbErr::UnpackInsertId) => {}
            Err(err) => return Err(err.into()),
        }

        // SQLite cannot unpack UUID insert ids; re-read the row we just wrote.
        Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ApiError::new(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Audit event not persisted",
                )
            })
    }

    /// Same as [`record`](Self::record) but never propagates failure: the
    /// audit trail must not abort the flow being audited.
    pub async fn record_best_effort(
        &self,
        tenant_id: Option<Uuid>,
        platform: Option<&str>,
        stage: &str,
        outcome: &str,
        detail: Option<JsonValue>,
    ) {
        if let Err(err) = self
            .record(tenant_id, platform, stage, outcome, detail)
            .await
        {
            tracing::error!(
                stage = stage,
                outcome = outcome,
                error = ?err,
                "Failed to write audit event"
            );
        }
    }

    /// Recent events for a tenant, newest first.
    pub async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        stage: Option<&str>,
        limit: u64,
    ) -> Result<Vec<Model>, ApiError> {
        let mut query = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_desc(Column::CreatedAt)
            .limit(limit);

        if let Some(stage) = stage {
            query = query.filter(Column::Stage.eq(stage));
        }

        Ok(query.all(&self.db).await?)
    }
}

//! # Content Repository
//!
//! Database operations for content_items: sync upserts deduplicated on
//! (tenant, platform, external_id), and enrichment write-back of derived
//! fields.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::content_item::{ActiveModel, Column, Entity, Model};
use crate::platforms::ContentDraft;

/// Repository for content item database operations
#[derive(Clone)]
pub struct ContentRepository {
    db: DatabaseConnection,
}

impl ContentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, ApiError> {
        Ok(Entity::find_by_id(id).one(&self.db).await?)
    }

    /// Insert or refresh a synced item. Returns the stored row and whether
    /// the payload is new or changed (the signal for enqueueing enrichment).
    pub async fn upsert_draft(
        &self,
        tenant_id: Uuid,
        platform: &str,
        draft: &ContentDraft,
        now: DateTime<Utc>,
    ) -> Result<(Model, bool), ApiError> {
        let existing = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Platform.eq(platform))
            .filter(Column::ExternalId.eq(draft.external_id.as_str()))
            .one(&self.db)
            .await?;

        if let Some(model) = existing {
            let changed = model.payload != draft.payload;
            let id = model.id;
            let mut active: ActiveModel = model.into();
            if changed {
                active.payload = Set(draft.payload.clone());
            }
            active.synced_at = Set(now.fixed_offset());
            active.updated_at = Set(now.fixed_offset());
            let updated = active.update(&self.db).await?;
            tracing::debug!(
                content_id = %id,
                external_id = draft.external_id,
                changed = changed,
                "Content item refreshed"
            );
            return Ok((updated, changed));
        }

        let id = Uuid::new_v4();
        let item = ActiveModel {
            id: Set(id),
            tenant_id: Set(tenant_id),
            platform: Set(platform.to_string()),
            external_id: Set(draft.external_id.clone()),
            kind: Set(draft.kind.clone()),
            payload: Set(draft.payload.clone()),
            transcript: Set(None),
            embedding: Set(None),
            enriched_at: Set(None),
            synced_at: Set(now.fixed_offset()),
            created_at: Set(now.fixed_offset()),
            updated_at: Set(now.fixed_offset()),
        };

        match item.insert(&self.db).await {
            Ok(model) => return Ok((model, true)),
            Err(DbErr::UnpackInsertId) => {}
            Err(err) => return Err(err.into()),
        }

        let model = Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ApiError::new(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Content item not persisted",
                )
            })?;
        Ok((model, true))
    }

    /// Write enrichment output back onto the content row.
    pub async fn write_enrichment(
        &self,
        id: Uuid,
        transcript: Option<String>,
        embedding: Option<JsonValue>,
        now: DateTime<Utc>,
    ) -> Result<Model, ApiError> {
        let model = self.find_by_id(id).await?.ok_or_else(|| {
            crate::error::not_found("Content item not found for enrichment")
        })?;

        let mut active: ActiveModel = model.into();
        active.transcript = Set(transcript);
        active.embedding = Set(embedding);
        active.enriched_at = Set(Some(now.fixed_offset()));
        active.updated_at = Set(now.fixed_offset());
        Ok(active.update(&self.db).await?)
    }

    /// List items for a tenant, newest first, optionally per platform.
    pub async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        platform: Option<&str>,
        limit: u64,
    ) -> Result<Vec<Model>, ApiError> {
        let mut query = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_desc(Column::SyncedAt)
            .limit(limit);

        if let Some(platform) = platform {
            query = query.filter(Column::Platform.eq(platform));
        }

        Ok(query.all(&self.db).await?)
    }
}

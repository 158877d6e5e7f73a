//! # Tenant Repository
//!
//! Database operations for the tenants table: the client registry mapping
//! each tenant to its delivery endpoint and shared signing secret.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::tenant::{ActiveModel, Entity, Model};

/// Repository for tenant database operations
#[derive(Clone)]
pub struct TenantRepository {
    db: DatabaseConnection,
}

impl TenantRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>, ApiError> {
        Ok(Entity::find_by_id(id).one(&self.db).await?)
    }

    /// Insert or replace a tenant entry. Passing an existing id updates the
    /// endpoint and secret in place; a fresh id registers a new tenant.
    pub async fn upsert(
        &self,
        id: Uuid,
        name: Option<String>,
        endpoint_url: String,
        shared_secret: String,
    ) -> Result<Model, ApiError> {
        let now = Utc::now().fixed_offset();

        if let Some(existing) = Entity::find_by_id(id).one(&self.db).await? {
            let mut active: ActiveModel = existing.into();
            active.name = Set(name);
            active.endpoint_url = Set(endpoint_url);
            active.shared_secret = Set(shared_secret);
            active.updated_at = Set(now);
            return Ok(active.update(&self.db).await?);
        }

        let tenant = ActiveModel {
            id: Set(id),
            name: Set(name),
            endpoint_url: Set(endpoint_url),
            shared_secret: Set(shared_secret),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match tenant.insert(&self.db).await {
            Ok(model) => return Ok(model),
            Err(DbErr::UnpackInsertId) => {}
            Err(err) => return Err(err.into()),
        }

        Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ApiError::new(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Tenant not persisted",
                )
            })
    }

    pub async fn list(&self) -> Result<Vec<Model>, ApiError> {
        Ok(Entity::find().all(&self.db).await?)
    }
}

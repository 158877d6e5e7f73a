//! # Job Status Handlers
//!
//! Tenant-scoped queue introspection. Terminal failures stay queryable here;
//! a job that exhausted its retries is a `failed` row, not an absence.

use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::auth::TenantExtension;
use crate::error::ApiError;
use crate::models::enrichment_job::Model as EnrichmentJobModel;
use crate::models::sync_job::Model as SyncJobModel;
use crate::server::AppState;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

#[derive(Debug, Deserialize)]
pub struct SyncJobParams {
    pub platform: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct EnrichmentJobParams {
    pub status: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SyncJobResponse {
    pub id: Uuid,
    pub platform: String,
    pub kind: String,
    pub status: String,
    pub priority: i16,
    pub attempts: i32,
    pub run_after: Option<String>,
    pub finished_at: Option<String>,
    pub error: Option<JsonValue>,
    pub created_at: String,
}

impl From<SyncJobModel> for SyncJobResponse {
    fn from(model: SyncJobModel) -> Self {
        Self {
            id: model.id,
            platform: model.platform,
            kind: model.kind,
            status: model.status,
            priority: model.priority,
            attempts: model.attempts,
            run_after: model.run_after.map(|dt| dt.to_rfc3339()),
            finished_at: model.finished_at.map(|dt| dt.to_rfc3339()),
            error: model.error,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnrichmentJobResponse {
    pub id: Uuid,
    pub content_id: Uuid,
    pub content_type: String,
    pub status: String,
    pub attempts: i32,
    pub error_message: Option<String>,
    pub run_after: Option<String>,
    pub finished_at: Option<String>,
    pub created_at: String,
}

impl From<EnrichmentJobModel> for EnrichmentJobResponse {
    fn from(model: EnrichmentJobModel) -> Self {
        Self {
            id: model.id,
            content_id: model.content_id,
            content_type: model.content_type,
            status: model.status,
            attempts: model.attempts,
            error_message: model.error_message,
            run_after: model.run_after.map(|dt| dt.to_rfc3339()),
            finished_at: model.finished_at.map(|dt| dt.to_rfc3339()),
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

/// `GET /jobs/sync?platform=&status=`
pub async fn list_sync_jobs(
    State(state): State<AppState>,
    TenantExtension(tenant): TenantExtension,
    Query(params): Query<SyncJobParams>,
) -> Result<Json<Vec<SyncJobResponse>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let jobs = state
        .sync_jobs()
        .list_by_tenant(
            tenant.0,
            params.platform.as_deref(),
            params.status.as_deref(),
            limit,
        )
        .await?;

    Ok(Json(jobs.into_iter().map(Into::into).collect()))
}

/// `GET /jobs/enrichment?status=`
pub async fn list_enrichment_jobs(
    State(state): State<AppState>,
    TenantExtension(tenant): TenantExtension,
    Query(params): Query<EnrichmentJobParams>,
) -> Result<Json<Vec<EnrichmentJobResponse>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let jobs = state
        .enrichment_jobs()
        .list_by_tenant(tenant.0, params.status.as_deref(), limit)
        .await?;

    Ok(Json(jobs.into_iter().map(Into::into).collect()))
}

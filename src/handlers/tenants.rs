//! # Tenant Admin Handlers
//!
//! Tenant registry management. Admin-bearer-only; the shared secret is
//! accepted on write and never echoed back.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::auth::AdminAuth;
use crate::error::{validation_error, ApiError};
use crate::models::tenant::Model as TenantModel;
use crate::server::AppState;

/// Request payload for registering or updating a tenant
#[derive(Debug, Deserialize)]
pub struct UpsertTenantRequest {
    /// Existing tenant id to update; omit to register a new tenant
    pub id: Option<Uuid>,
    /// Display name for the tenant
    pub name: Option<String>,
    /// Endpoint credentials are delivered to (absolute http(s) URL)
    pub endpoint_url: String,
    /// Secret used to sign deliveries to the endpoint
    pub shared_secret: String,
}

/// Tenant representation without the shared secret
#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub id: Uuid,
    pub name: Option<String>,
    pub endpoint_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<TenantModel> for TenantResponse {
    fn from(model: TenantModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            endpoint_url: model.endpoint_url,
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}

/// `POST /admin/tenants`: upsert a tenant registry entry.
pub async fn upsert_tenant(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Json(request): Json<UpsertTenantRequest>,
) -> Result<(StatusCode, Json<TenantResponse>), ApiError> {
    validate(&request)?;

    let is_new = request.id.is_none();
    let id = request.id.unwrap_or_else(Uuid::new_v4);

    let tenant = state
        .tenants()
        .upsert(id, request.name, request.endpoint_url, request.shared_secret)
        .await?;

    tracing::info!(tenant_id = %tenant.id, new = is_new, "Tenant registry entry upserted");

    let status = if is_new {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(tenant.into())))
}

fn validate(request: &UpsertTenantRequest) -> Result<(), ApiError> {
    match Url::parse(&request.endpoint_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => {
            return Err(validation_error(
                "Invalid endpoint URL",
                serde_json::json!({ "endpoint_url": "must be an absolute http(s) URL" }),
            ));
        }
    }

    if request.shared_secret.trim().is_empty() {
        return Err(validation_error(
            "Invalid shared secret",
            serde_json::json!({ "shared_secret": "must not be empty" }),
        ));
    }

    Ok(())
}

//! # Credential Handlers
//!
//! Tenant-scoped credential queries. The metadata listing never touches
//! ciphertext; the token endpoint is the single decrypt-on-read surface and
//! every hit is audit-logged by the repository.

use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::auth::TenantExtension;
use crate::error::{not_found, ApiError};
use crate::models::credential::Model as CredentialModel;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub platform: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub platform: String,
}

/// Credential metadata without secret material
#[derive(Debug, Serialize)]
pub struct CredentialMetadataResponse {
    pub platform: String,
    pub expires_at: Option<String>,
    /// Computed from `expires_at` at read time
    pub expired: bool,
    pub scopes: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub last_refreshed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CredentialModel> for CredentialMetadataResponse {
    fn from(model: CredentialModel) -> Self {
        let expired = model
            .expires_at
            .map(|at| at.with_timezone(&Utc) <= Utc::now())
            .unwrap_or(false);
        Self {
            platform: model.platform,
            expires_at: model.expires_at.map(|dt| dt.to_rfc3339()),
            expired,
            scopes: model.scopes,
            metadata: model.metadata,
            last_refreshed_at: model.last_refreshed_at.map(|dt| dt.to_rfc3339()),
            created_at: model.created_at.to_rfc3339(),
            updated_at: model.updated_at.to_rfc3339(),
        }
    }
}

/// Decrypted token response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub platform: String,
    pub access_secret: String,
    pub refresh_secret: Option<String>,
    pub expires_at: Option<String>,
    pub expired: bool,
    pub scopes: Vec<String>,
}

/// `GET /credentials?platform=`: metadata-only listing for the tenant.
pub async fn list_credentials(
    State(state): State<AppState>,
    TenantExtension(tenant): TenantExtension,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<CredentialMetadataResponse>>, ApiError> {
    let mut models = state.credentials().find_by_tenant(tenant.0).await?;

    if let Some(platform) = params.platform {
        models.retain(|m| m.platform == platform);
    }

    Ok(Json(models.into_iter().map(Into::into).collect()))
}

/// `GET /credentials/token?platform=`: decrypted token with expiry flag.
///
/// Audit-logged as a `token_read` event by the repository.
pub async fn get_token(
    State(state): State<AppState>,
    TenantExtension(tenant): TenantExtension,
    Query(params): Query<TokenParams>,
) -> Result<Json<TokenResponse>, ApiError> {
    let decrypted = state
        .credentials()
        .get_decrypted(tenant.0, &params.platform, "api")
        .await?
        .ok_or_else(|| {
            not_found(format!("No credential stored for platform '{}'", params.platform).as_str())
        })?;

    Ok(Json(TokenResponse {
        platform: decrypted.platform,
        access_secret: decrypted.access_secret,
        refresh_secret: decrypted.refresh_secret,
        expires_at: decrypted.expires_at.map(|dt| dt.to_rfc3339()),
        expired: decrypted.expired,
        scopes: decrypted.scopes,
    }))
}

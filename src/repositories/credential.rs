//! # Credential Repository
//!
//! Database operations for the credentials table. Token material is sealed
//! by the vault before it touches the database and only leaves through
//! [`CredentialRepository::get_decrypted`], which audit-logs the read.
//!
//! Upserts run in a transaction with a row lock on the (tenant, platform)
//! record so OAuth completion and token refresh cannot race each other.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::LockType;
use serde_json::{json, Map, Value as JsonValue};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::audit_event::{OUTCOME_SUCCESS, STAGE_TOKEN_READ};
use crate::models::credential::{ActiveModel, Column, Entity, Model};
use crate::platforms::CredentialBundle;
use crate::repositories::audit::AuditRepository;
use crate::vault::{credential_aad, Vault};

/// A credential with its secrets decrypted for use.
#[derive(Debug, Clone)]
pub struct DecryptedCredential {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub platform: String,
    pub access_secret: String,
    pub refresh_secret: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Computed from `expires_at` at read time.
    pub expired: bool,
    pub scopes: Vec<String>,
    pub metadata: Map<String, JsonValue>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl DecryptedCredential {
    /// Rehydrate the platform-facing bundle shape.
    pub fn into_bundle(self) -> CredentialBundle {
        CredentialBundle {
            platform: self.platform,
            access_secret: self.access_secret,
            refresh_secret: self.refresh_secret,
            expires_at: self.expires_at,
            scopes: self.scopes,
            metadata: self.metadata,
        }
    }
}

/// Repository for credential database operations
#[derive(Clone)]
pub struct CredentialRepository {
    db: DatabaseConnection,
    vault: Vault,
    audit: AuditRepository,
}

impl CredentialRepository {
    pub fn new(db: DatabaseConnection, vault: Vault) -> Self {
        let audit = AuditRepository::new(db.clone());
        Self { db, vault, audit }
    }

    /// Seal a bundle and insert or replace the (tenant, platform) record.
    ///
    /// OAuth completion and token refresh both land here; the row lock
    /// serializes them.
    pub async fn upsert_bundle(
        &self,
        tenant_id: Uuid,
        bundle: &CredentialBundle,
        refreshed: bool,
    ) -> Result<Model, ApiError> {
        let aad = credential_aad(tenant_id, &bundle.platform);
        let access_ciphertext = self.vault.seal(&aad, bundle.access_secret.as_bytes())?;
        let refresh_ciphertext = match &bundle.refresh_secret {
            Some(secret) => Some(self.vault.seal(&aad, secret.as_bytes())?),
            None => None,
        };

        let now = Utc::now().fixed_offset();
        let txn = self.db.begin().await?;

        let existing = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Platform.eq(bundle.platform.as_str()))
            .lock(LockType::Update)
            .one(&txn)
            .await?;

        let id = match existing {
            Some(model) => {
                let id = model.id;
                let mut active: ActiveModel = model.into();
                active.access_secret_ciphertext = Set(access_ciphertext);
                active.refresh_secret_ciphertext = Set(refresh_ciphertext);
                active.expires_at = Set(bundle.expires_at.map(|dt| dt.fixed_offset()));
                active.scopes = Set(Some(json!(bundle.scopes)));
                active.metadata = Set(Some(JsonValue::Object(bundle.metadata.clone())));
                if refreshed {
                    active.last_refreshed_at = Set(Some(now));
                }
                active.updated_at = Set(now);
                active.update(&txn).await?;
                id
            }
            None => {
                let id = Uuid::new_v4();
                let credential = ActiveModel {
                    id: Set(id),
                    tenant_id: Set(tenant_id),
                    platform: Set(bundle.platform.clone()),
                    access_secret_ciphertext: Set(access_ciphertext),
                    refresh_secret_ciphertext: Set(refresh_ciphertext),
                    expires_at: Set(bundle.expires_at.map(|dt| dt.fixed_offset())),
                    scopes: Set(Some(json!(bundle.scopes))),
                    metadata: Set(Some(JsonValue::Object(bundle.metadata.clone()))),
                    last_refreshed_at: Set(if refreshed { Some(now) } else { None }),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                match credential.insert(&txn).await {
                    Ok(_) | Err(DbErr::UnpackInsertId) => {}
                    Err(err) => {
                        txn.rollback().await?;
                        return Err(err.into());
                    }
                }
                id
            }
        };

        txn.commit().await?;

        Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ApiError::new(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Credential not persisted",
                )
            })
    }

    /// Metadata-only view: no ciphertext leaves this call.
    pub async fn find_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Model>, ApiError> {
        Ok(Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .all(&self.db)
            .await?)
    }

    pub async fn find_by_tenant_platform(
        &self,
        tenant_id: Uuid,
        platform: &str,
    ) -> Result<Option<Model>, ApiError> {
        Ok(Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Platform.eq(platform))
            .one(&self.db)
            .await?)
    }

    /// Decrypt the stored secrets for a tenant/platform pair.
    ///
    /// The only decrypt-on-read path in the crate; every call leaves a
    /// `token_read` audit event. A decryption failure surfaces as
    /// `DECRYPTION_FAILED`, never as not-found.
    pub async fn get_decrypted(
        &self,
        tenant_id: Uuid,
        platform: &str,
        reader: &str,
    ) -> Result<Option<DecryptedCredential>, ApiError> {
        let Some(model) = self.find_by_tenant_platform(tenant_id, platform).await? else {
            return Ok(None);
        };

        let decrypted = self.decrypt(&model)?;

        self.audit
            .record_best_effort(
                Some(tenant_id),
                Some(platform),
                STAGE_TOKEN_READ,
                OUTCOME_SUCCESS,
                Some(json!({ "reader": reader, "expired": decrypted.expired })),
            )
            .await;

        Ok(Some(decrypted))
    }

    fn decrypt(&self, model: &Model) -> Result<DecryptedCredential, ApiError> {
        let aad = credential_aad(model.tenant_id, &model.platform);
        let access_secret = self
            .vault
            .open_string(&aad, &model.access_secret_ciphertext)?;
        let refresh_secret = match &model.refresh_secret_ciphertext {
            Some(ciphertext) => Some(self.vault.open_string(&aad, ciphertext)?),
            None => None,
        };

        let expires_at = model.expires_at.map(|dt| dt.with_timezone(&Utc));
        let expired = expires_at.is_some_and(|at| at <= Utc::now());

        let scopes = model
            .scopes
            .as_ref()
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let metadata = model
            .metadata
            .as_ref()
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        Ok(DecryptedCredential {
            id: model.id,
            tenant_id: model.tenant_id,
            platform: model.platform.clone(),
            access_secret,
            refresh_secret,
            expires_at,
            expired,
            scopes,
            metadata,
            last_refreshed_at: model.last_refreshed_at.map(|dt| dt.with_timezone(&Utc)),
        })
    }
}

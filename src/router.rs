//! # Credential Router
//!
//! Routes a freshly exchanged credential bundle to its tenant: persist to
//! the encrypted store first, then POST the bundle to the tenant's delivery
//! endpoint with an HMAC-SHA256 signature over the body. Delivery failures
//! are retried with capped exponential backoff and always audited; the
//! stored credential survives regardless, so a tenant can re-trigger
//! delivery without re-authorizing.

use chrono::Utc;
use hmac::{Hmac, Mac};
use metrics::counter;
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::DeliveryConfig;
use crate::models::audit_event::{OUTCOME_FAILURE, OUTCOME_SUCCESS, STAGE_DELIVER};
use crate::models::credential::Model as CredentialModel;
use crate::models::tenant::Model as TenantModel;
use crate::platforms::CredentialBundle;
use crate::repositories::{AuditRepository, CredentialRepository, TenantRepository};

/// Signature header attached to every delivery POST.
pub const SIGNATURE_HEADER: &str = "X-Broker-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Delivery path errors.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The tenant has no registry entry; nothing was persisted.
    #[error("tenant {tenant_id} is not registered")]
    TenantNotRegistered { tenant_id: Uuid },
    /// The credential could not be written to the store.
    #[error("credential persistence failed: {0}")]
    Persistence(String),
    /// Every delivery attempt failed; the credential is stored.
    #[error("delivery exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Router from exchanged bundles to tenant endpoints.
#[derive(Clone)]
pub struct CredentialRouter {
    tenants: TenantRepository,
    credentials: CredentialRepository,
    audit: AuditRepository,
    http: reqwest::Client,
    config: DeliveryConfig,
}

impl CredentialRouter {
    pub fn new(
        tenants: TenantRepository,
        credentials: CredentialRepository,
        audit: AuditRepository,
        http: reqwest::Client,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            tenants,
            credentials,
            audit,
            http,
            config,
        }
    }

    /// Persist the bundle and deliver it to the tenant endpoint.
    ///
    /// Persistence happens before the first delivery attempt. An unknown
    /// tenant fails before anything is written.
    pub async fn deliver(
        &self,
        tenant_id: Uuid,
        bundle: &CredentialBundle,
    ) -> Result<CredentialModel, DeliveryError> {
        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .await
            .map_err(|e| DeliveryError::Persistence(e.message.to_string()))?
            .ok_or(DeliveryError::TenantNotRegistered { tenant_id })?;

        let credential = self
            .credentials
            .upsert_bundle(tenant_id, bundle, false)
            .await
            .map_err(|e| DeliveryError::Persistence(e.message.to_string()))?;

        self.post_with_retries(&tenant, bundle).await?;

        Ok(credential)
    }

    async fn post_with_retries(
        &self,
        tenant: &TenantModel,
        bundle: &CredentialBundle,
    ) -> Result<(), DeliveryError> {
        let payload = json!({
            "tenant_id": tenant.id,
            "platform": bundle.platform,
            "access_secret": bundle.access_secret,
            "refresh_secret": bundle.refresh_secret,
            "expires_at": bundle.expires_at,
            "scopes": bundle.scopes,
            "metadata": bundle.metadata,
            "delivered_at": Utc::now(),
        });
        let body = payload.to_string();
        let signature = sign_payload(&tenant.shared_secret, body.as_bytes());

        let labels = [("platform", bundle.platform.clone())];
        let max_attempts = self.config.max_attempts;
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            counter!("credential_delivery_attempts_total", &labels).increment(1);

            let result = self
                .http
                .post(&tenant.endpoint_url)
                .header("Content-Type", "application/json")
                .header(SIGNATURE_HEADER, &signature)
                .timeout(Duration::from_secs(self.config.timeout_seconds))
                .body(body.clone())
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    counter!("credential_delivery_success_total", &labels).increment(1);
                    tracing::info!(
                        tenant_id = %tenant.id,
                        platform = bundle.platform,
                        attempts = attempt + 1,
                        "Credential delivered to tenant endpoint"
                    );
                    self.audit
                        .record_best_effort(
                            Some(tenant.id),
                            Some(&bundle.platform),
                            STAGE_DELIVER,
                            OUTCOME_SUCCESS,
                            Some(json!({ "attempts": attempt + 1 })),
                        )
                        .await;
                    return Ok(());
                }
                Ok(response) => {
                    last_error = format!("endpoint returned HTTP {}", response.status().as_u16());
                }
                Err(err) => {
                    last_error = format!("request failed: {err}");
                }
            }

            tracing::warn!(
                tenant_id = %tenant.id,
                platform = bundle.platform,
                attempt = attempt + 1,
                error = last_error,
                "Credential delivery attempt failed"
            );

            if attempt + 1 < max_attempts {
                sleep(self.backoff(attempt)).await;
            }
        }

        counter!("credential_delivery_failure_total", &labels).increment(1);
        self.audit
            .record_best_effort(
                Some(tenant.id),
                Some(&bundle.platform),
                STAGE_DELIVER,
                OUTCOME_FAILURE,
                Some(json!({ "attempts": max_attempts, "error": last_error })),
            )
            .await;

        Err(DeliveryError::Exhausted {
            attempts: max_attempts,
        })
    }

    /// `base * 2^n` milliseconds, capped.
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(20);
        let millis = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << exponent)
            .min(self.config.backoff_cap_ms);
        Duration::from_millis(millis)
    }
}

/// HMAC-SHA256 over the delivery body, hex encoded.
pub fn sign_payload(shared_secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(shared_secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_per_secret() {
        let a = sign_payload("secret-a", b"{\"platform\":\"meta\"}");
        let b = sign_payload("secret-a", b"{\"platform\":\"meta\"}");
        let c = sign_payload("secret-b", b"{\"platform\":\"meta\"}");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_changes_with_body() {
        let a = sign_payload("secret", b"body-one");
        let b = sign_payload("secret", b"body-two");
        assert_ne!(a, b);
    }
}

//! # OAuth Broker Core
//!
//! The authorize/complete state machine. `authorize` mints a sealed state
//! token and hands back the provider URL; `complete` validates the returning
//! state, exchanges the single-use code, persists and delivers the credential
//! through the router, and enqueues the initial backfill sync. Every stage
//! appends an audit event, success or failure.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde_json::json;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::audit_event::{
    OUTCOME_FAILURE, OUTCOME_SUCCESS, STAGE_AUTHORIZE, STAGE_CALLBACK, STAGE_DELIVER,
    STAGE_EXCHANGE,
};
use crate::models::sync_job::KIND_BACKFILL;
use crate::oauth::state::{StateToken, StateTokenError};
use crate::platforms::{ExchangeError, Registry};
use crate::repositories::{AuditRepository, SyncJobRepository, TenantRepository};
use crate::router::{CredentialRouter, DeliveryError};
use crate::vault::Vault;

/// Failures starting an authorization flow.
#[derive(Debug, Error)]
pub enum AuthorizeError {
    #[error("platform '{platform}' is not enabled")]
    UnknownPlatform { platform: String },
    #[error("tenant {tenant_id} is not registered")]
    TenantNotRegistered { tenant_id: Uuid },
    #[error(transparent)]
    State(#[from] StateTokenError),
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failures completing a callback. `kind` feeds the landing-page
/// `?error=<kind>` query parameter.
#[derive(Debug, Error)]
pub enum CompleteError {
    #[error(transparent)]
    State(StateTokenError),
    #[error("platform '{platform}' is not enabled")]
    UnknownPlatform { platform: String },
    #[error(transparent)]
    Exchange(ExchangeError),
    #[error("tenant {tenant_id} is not registered")]
    TenantNotRegistered { tenant_id: Uuid },
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompleteError {
    /// Stable machine-readable kind for the landing redirect.
    pub fn kind(&self) -> &'static str {
        match self {
            CompleteError::State(StateTokenError::Expired { .. }) => "expired_state",
            CompleteError::State(_) => "invalid_state",
            CompleteError::UnknownPlatform { .. } => "unknown_platform",
            CompleteError::Exchange(_) => "exchange_failed",
            CompleteError::TenantNotRegistered { .. } => "tenant_not_registered",
            CompleteError::Internal(_) => "internal",
        }
    }
}

/// The OAuth flow orchestrator.
#[derive(Clone)]
pub struct Broker {
    config: Arc<AppConfig>,
    registry: Registry,
    vault: Vault,
    tenants: TenantRepository,
    router: CredentialRouter,
    sync_jobs: SyncJobRepository,
    audit: AuditRepository,
}

impl Broker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<AppConfig>,
        registry: Registry,
        vault: Vault,
        tenants: TenantRepository,
        router: CredentialRouter,
        sync_jobs: SyncJobRepository,
        audit: AuditRepository,
    ) -> Self {
        Self {
            config,
            registry,
            vault,
            tenants,
            router,
            sync_jobs,
            audit,
        }
    }

    /// Callback URI registered with every provider.
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}/callback",
            self.config.public_base_url.trim_end_matches('/')
        )
    }

    /// Start an authorization flow: mint a sealed state token and return the
    /// provider authorize URL.
    pub async fn authorize(
        &self,
        tenant_id: Uuid,
        platform: &str,
    ) -> Result<Url, AuthorizeError> {
        let result = self.authorize_inner(tenant_id, platform).await;

        match &result {
            Ok(_) => {
                counter!("oauth_authorize_total", &[("platform", platform.to_string())])
                    .increment(1);
                self.audit
                    .record_best_effort(
                        Some(tenant_id),
                        Some(platform),
                        STAGE_AUTHORIZE,
                        OUTCOME_SUCCESS,
                        None,
                    )
                    .await;
            }
            Err(err) => {
                self.audit
                    .record_best_effort(
                        Some(tenant_id),
                        Some(platform),
                        STAGE_AUTHORIZE,
                        OUTCOME_FAILURE,
                        Some(json!({ "error": err.to_string() })),
                    )
                    .await;
            }
        }

        result
    }

    async fn authorize_inner(
        &self,
        tenant_id: Uuid,
        platform: &str,
    ) -> Result<Url, AuthorizeError> {
        if self
            .tenants
            .find_by_id(tenant_id)
            .await
            .map_err(|e| AuthorizeError::Internal(e.message.to_string()))?
            .is_none()
        {
            return Err(AuthorizeError::TenantNotRegistered { tenant_id });
        }

        let handler =
            self.registry
                .get(platform)
                .map_err(|_| AuthorizeError::UnknownPlatform {
                    platform: platform.to_string(),
                })?;

        let state = StateToken::mint(tenant_id, platform).seal(&self.vault)?;
        let url = handler.build_auth_url(&state, &self.redirect_uri())?;

        tracing::info!(
            tenant_id = %tenant_id,
            platform = platform,
            "Authorization flow started"
        );

        Ok(url)
    }

    /// Complete a provider callback.
    ///
    /// On success the credential is stored (and delivery attempted) and a
    /// backfill sync job is queued; returns the platform key for the landing
    /// redirect. Exchange failures are terminal: authorization codes are
    /// single-use, so nothing here retries.
    pub async fn complete(&self, code: &str, state: &str) -> Result<String, CompleteError> {
        let token = match StateToken::open(
            &self.vault,
            state,
            self.config.oauth_state_ttl_seconds,
            Utc::now(),
        ) {
            Ok(token) => token,
            Err(err) => {
                // No trustworthy tenant context exists for a bad state.
                self.audit
                    .record_best_effort(
                        None,
                        None,
                        STAGE_CALLBACK,
                        OUTCOME_FAILURE,
                        Some(json!({ "error": err.to_string() })),
                    )
                    .await;
                return Err(CompleteError::State(err));
            }
        };

        let tenant_id = token.tenant_id;
        let platform = token.platform.clone();

        self.audit
            .record_best_effort(
                Some(tenant_id),
                Some(&platform),
                STAGE_CALLBACK,
                OUTCOME_SUCCESS,
                None,
            )
            .await;

        let handler = match self.registry.get(&platform) {
            Ok(handler) => handler,
            Err(_) => {
                self.audit
                    .record_best_effort(
                        Some(tenant_id),
                        Some(&platform),
                        STAGE_EXCHANGE,
                        OUTCOME_FAILURE,
                        Some(json!({ "error": "platform not enabled" })),
                    )
                    .await;
                return Err(CompleteError::UnknownPlatform { platform });
            }
        };

        let bundle = match handler.exchange_code(code, &self.redirect_uri()).await {
            Ok(bundle) => bundle,
            Err(err) => {
                counter!(
                    "oauth_exchange_failure_total",
                    &[("platform", platform.clone())]
                )
                .increment(1);
                self.audit
                    .record_best_effort(
                        Some(tenant_id),
                        Some(&platform),
                        STAGE_EXCHANGE,
                        OUTCOME_FAILURE,
                        Some(json!({ "error": err.to_string() })),
                    )
                    .await;
                return Err(CompleteError::Exchange(err));
            }
        };

        self.audit
            .record_best_effort(
                Some(tenant_id),
                Some(&platform),
                STAGE_EXCHANGE,
                OUTCOME_SUCCESS,
                Some(json!({ "scopes": bundle.scopes, "has_refresh": bundle.refresh_secret.is_some() })),
            )
            .await;

        // Persist first, deliver second. Delivery exhaustion is audited by
        // the router and does not undo the exchange.
        match self.router.deliver(tenant_id, &bundle).await {
            Ok(_) => {}
            Err(DeliveryError::TenantNotRegistered { tenant_id }) => {
                // Retry exhaustion is audited by the router; the short-circuit
                // failures must leave a deliver-stage row too.
                self.audit
                    .record_best_effort(
                        Some(tenant_id),
                        Some(&platform),
                        STAGE_DELIVER,
                        OUTCOME_FAILURE,
                        Some(json!({ "error": "tenant not registered" })),
                    )
                    .await;
                return Err(CompleteError::TenantNotRegistered { tenant_id });
            }
            Err(DeliveryError::Persistence(details)) => {
                self.audit
                    .record_best_effort(
                        Some(tenant_id),
                        Some(&platform),
                        STAGE_DELIVER,
                        OUTCOME_FAILURE,
                        Some(json!({ "error": details.clone() })),
                    )
                    .await;
                return Err(CompleteError::Internal(details));
            }
            Err(err @ DeliveryError::Exhausted { .. }) => {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    platform = platform,
                    error = %err,
                    "Credential stored but delivery failed; tenant may re-trigger delivery"
                );
            }
        }

        self.sync_jobs
            .enqueue(tenant_id, &platform, KIND_BACKFILL)
            .await
            .map_err(|e| CompleteError::Internal(e.message.to_string()))?;

        counter!(
            "oauth_complete_total",
            &[("platform", platform.clone())]
        )
        .increment(1);
        tracing::info!(
            tenant_id = %tenant_id,
            platform = platform,
            "OAuth flow completed; backfill queued"
        );

        Ok(platform)
    }
}

//! # OAuth Flow Handlers
//!
//! The browser-facing pair: `/auth/{platform}` starts an authorization flow
//! and `/callback` completes it. The callback always answers with a redirect
//! to the landing page; failures become `?error=<kind>` there rather than
//! API error bodies, since the user is mid-browser-flow.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::error::{not_found, platform_error, ApiError, ErrorType};
use crate::oauth::AuthorizeError;
use crate::platforms::ExchangeError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    /// Tenant starting the flow.
    pub tenant: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by providers when the user denies the grant.
    pub error: Option<String>,
}

/// `GET /auth/{platform}?tenant=<uuid>`: 302 to the provider authorize URL.
pub async fn authorize(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Redirect, ApiError> {
    let url = state
        .broker()
        .authorize(params.tenant, &platform)
        .await
        .map_err(map_authorize_error)?;

    Ok(Redirect::temporary(url.as_str()))
}

/// `GET /callback?code&state`: complete the flow and bounce to the landing
/// page with `?connected=<platform>` or `?error=<kind>`.
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    if let Some(provider_error) = params.error {
        tracing::warn!(error = provider_error, "Provider callback carried an error");
        return landing_redirect(&state, "error", "provider_denied");
    }

    let (Some(code), Some(sealed_state)) = (params.code, params.state) else {
        return landing_redirect(&state, "error", "invalid_callback");
    };

    match state.broker().complete(&code, &sealed_state).await {
        Ok(platform) => landing_redirect(&state, "connected", &platform),
        Err(err) => {
            tracing::warn!(error = %err, kind = err.kind(), "OAuth completion failed");
            landing_redirect(&state, "error", err.kind())
        }
    }
}

fn map_authorize_error(err: AuthorizeError) -> ApiError {
    match err {
        AuthorizeError::UnknownPlatform { platform } => {
            not_found(format!("Platform '{}' is not enabled", platform).as_str())
        }
        AuthorizeError::TenantNotRegistered { tenant_id } => {
            not_found(format!("Tenant {} is not registered", tenant_id).as_str())
        }
        AuthorizeError::State(_) | AuthorizeError::Internal(_) => {
            ErrorType::InternalServerError.into()
        }
        AuthorizeError::Exchange(ExchangeError::Rejected {
            platform,
            status,
            body,
        }) => platform_error(platform, status, body),
        AuthorizeError::Exchange(exchange) => {
            tracing::error!(error = %exchange, "Failed to build authorize URL");
            ErrorType::InternalServerError.into()
        }
    }
}

fn landing_redirect(state: &AppState, key: &str, value: &str) -> Redirect {
    let target = match Url::parse(&state.config.landing_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            url.to_string()
        }
        Err(_) => format!("{}?{}={}", state.config.landing_url, key, value),
    };
    Redirect::temporary(&target)
}

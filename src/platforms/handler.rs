//! Platform handler trait definition
//!
//! Defines the interface every platform adapter implements: authorize URL
//! construction, code exchange, token refresh, and the data pulls used by the
//! sync worker. Handlers are stateless and immutable once registered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Normalized output of a token exchange, independent of platform.
///
/// Platform-specific fields (account ids, page ids, workspace gids) live only
/// in `metadata`; nothing else in the broker may depend on them.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    /// Platform key the bundle belongs to
    pub platform: String,
    /// Raw access secret (plaintext; encrypted only at the store boundary)
    pub access_secret: String,
    /// Raw refresh secret, for platforms that issue one
    pub refresh_secret: Option<String>,
    /// Absolute expiry; None for platforms whose tokens never expire
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scope names
    pub scopes: Vec<String>,
    /// Free-form platform-specific metadata
    pub metadata: Map<String, Value>,
}

impl CredentialBundle {
    /// True when the bundle has an expiry in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// A content item as pulled from a platform, before persistence.
#[derive(Debug, Clone)]
pub struct ContentDraft {
    /// Platform-side identifier, unique per (tenant, platform)
    pub external_id: String,
    /// Content-type tag ("post", "file", "task")
    pub kind: String,
    /// Raw platform payload
    pub payload: Value,
}

/// Errors from the authorize/exchange/refresh path.
///
/// Authorization codes are single-use, so exchange failures are never
/// retried; they abort the attempt and surface on the callback redirect.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("platform {platform} rejected the request with status {status}")]
    Rejected {
        platform: String,
        status: u16,
        body: Option<String>,
    },
    #[error("network error talking to {platform}: {details}")]
    Network { platform: String, details: String },
    #[error("malformed response from {platform}: {details}")]
    Malformed { platform: String, details: String },
    #[error("platform {platform} has no client credentials configured")]
    MissingClientCredentials { platform: String },
    #[error("platform {platform} issued no refresh secret")]
    RefreshUnsupported { platform: String },
}

impl ExchangeError {
    pub fn platform(&self) -> &str {
        match self {
            ExchangeError::Rejected { platform, .. }
            | ExchangeError::Network { platform, .. }
            | ExchangeError::Malformed { platform, .. }
            | ExchangeError::MissingClientCredentials { platform }
            | ExchangeError::RefreshUnsupported { platform } => platform,
        }
    }
}

/// Errors from the data-pull path, classified for the retry policy.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchError {
    /// Token rejected upstream; retrying without a refresh will not help
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
    /// Transient upstream failure (5xx, network); worth retrying
    #[error("transient error: {message}")]
    Transient { message: String },
    /// Permanent upstream failure (4xx other than auth)
    #[error("permanent error: {message}")]
    Permanent { message: String },
}

impl FetchError {
    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn permanent<S: Into<String>>(message: S) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Classify an HTTP status from a platform API call.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::unauthorized(format!("HTTP {status}: {body}")),
            s if s >= 500 => Self::transient(format!("HTTP {s}: {body}")),
            s => Self::permanent(format!("HTTP {s}: {body}")),
        }
    }
}

#[async_trait]
pub trait PlatformHandler: Send + Sync {
    /// Unique platform key ("meta", "google", "asana").
    fn key(&self) -> &'static str;

    /// Build the provider's authorize URL with the sealed state embedded.
    fn build_auth_url(&self, state: &str, redirect_uri: &str) -> Result<Url, ExchangeError>;

    /// Exchange an authorization code for a credential bundle.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<CredentialBundle, ExchangeError>;

    /// Refresh an expiring bundle using its refresh secret.
    async fn refresh(&self, bundle: &CredentialBundle) -> Result<CredentialBundle, ExchangeError>;

    /// Pull the account profile for the authorized identity.
    async fn fetch_profile(&self, bundle: &CredentialBundle) -> Result<Value, FetchError>;

    /// Pull the content listing for the authorized identity.
    async fn fetch_content(&self, bundle: &CredentialBundle)
        -> Result<Vec<ContentDraft>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_expiry() {
        let now = Utc::now();
        let expired = CredentialBundle {
            platform: "example".to_string(),
            access_secret: "secret".to_string(),
            refresh_secret: None,
            expires_at: Some(now - chrono::Duration::seconds(1)),
            scopes: vec![],
            metadata: Map::new(),
        };
        assert!(expired.is_expired(now));

        let fresh = CredentialBundle {
            expires_at: Some(now + chrono::Duration::hours(1)),
            ..expired.clone()
        };
        assert!(!fresh.is_expired(now));

        let never = CredentialBundle {
            expires_at: None,
            ..expired
        };
        assert!(!never.is_expired(now));
    }

    #[test]
    fn fetch_error_classification() {
        assert!(matches!(
            FetchError::from_status(401, "bad token".into()),
            FetchError::Unauthorized { .. }
        ));
        assert!(matches!(
            FetchError::from_status(503, "down".into()),
            FetchError::Transient { .. }
        ));
        assert!(matches!(
            FetchError::from_status(404, "gone".into()),
            FetchError::Permanent { .. }
        ));
    }
}

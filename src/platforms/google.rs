//! Google platform handler
//!
//! Standard Google OAuth 2.0 with offline access: refresh tokens are issued
//! and the sync pull lists the account's Drive files.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::config::PlatformCredentials;
use crate::platforms::handler::{
    ContentDraft, CredentialBundle, ExchangeError, FetchError, PlatformHandler,
};

const KEY: &str = "google";
const DEFAULT_AUTH_BASE: &str = "https://accounts.google.com";
const DEFAULT_TOKEN_BASE: &str = "https://oauth2.googleapis.com";
const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
const DEFAULT_SCOPES: &str =
    "openid email profile https://www.googleapis.com/auth/drive.readonly";

/// Google platform handler
pub struct GoogleHandler {
    creds: PlatformCredentials,
    http: reqwest::Client,
}

impl GoogleHandler {
    pub fn new(creds: PlatformCredentials, http: reqwest::Client) -> Self {
        Self { creds, http }
    }

    fn auth_base(&self) -> &str {
        self.creds.auth_base.as_deref().unwrap_or(DEFAULT_AUTH_BASE)
    }

    /// Token endpoint base. When an auth base override is set (tests), the
    /// token endpoint lives under it too.
    fn token_base(&self) -> &str {
        self.creds.auth_base.as_deref().unwrap_or(DEFAULT_TOKEN_BASE)
    }

    fn api_base(&self) -> &str {
        self.creds.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    fn client_pair(&self) -> Result<(&str, &str), ExchangeError> {
        match (&self.creds.client_id, &self.creds.client_secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(ExchangeError::MissingClientCredentials {
                platform: KEY.to_string(),
            }),
        }
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, ExchangeError> {
        let url = format!("{}/token", self.token_base().trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .form(form)
            .send()
            .await
            .map_err(|e| ExchangeError::Network {
                platform: KEY.to_string(),
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(ExchangeError::Rejected {
                platform: KEY.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| ExchangeError::Malformed {
            platform: KEY.to_string(),
            details: e.to_string(),
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_bundle(self) -> CredentialBundle {
        let mut metadata = Map::new();
        if let Some(token_type) = &self.token_type {
            metadata.insert("token_type".to_string(), Value::String(token_type.clone()));
        }
        CredentialBundle {
            platform: KEY.to_string(),
            access_secret: self.access_token,
            refresh_secret: self.refresh_token,
            expires_at: self.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            scopes: self
                .scope
                .as_deref()
                .unwrap_or(DEFAULT_SCOPES)
                .split_whitespace()
                .map(|s| s.to_string())
                .collect(),
            metadata,
        }
    }
}

#[async_trait]
impl PlatformHandler for GoogleHandler {
    fn key(&self) -> &'static str {
        KEY
    }

    fn build_auth_url(&self, state: &str, redirect_uri: &str) -> Result<Url, ExchangeError> {
        let (client_id, _) = self.client_pair()?;
        let mut url = Url::parse(&format!(
            "{}/o/oauth2/v2/auth",
            self.auth_base().trim_end_matches('/')
        ))
        .map_err(|e| ExchangeError::Malformed {
            platform: KEY.to_string(),
            details: e.to_string(),
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state)
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("scope", DEFAULT_SCOPES);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<CredentialBundle, ExchangeError> {
        let (client_id, client_secret) = self.client_pair()?;
        let token = self
            .request_token(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .await?;

        debug!(has_refresh = token.refresh_token.is_some(), "Google token exchange succeeded");
        Ok(token.into_bundle())
    }

    async fn refresh(&self, bundle: &CredentialBundle) -> Result<CredentialBundle, ExchangeError> {
        let (client_id, client_secret) = self.client_pair()?;
        let refresh_secret =
            bundle
                .refresh_secret
                .as_deref()
                .ok_or_else(|| ExchangeError::RefreshUnsupported {
                    platform: KEY.to_string(),
                })?;

        let token = self
            .request_token(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_secret),
                ("grant_type", "refresh_token"),
            ])
            .await?;

        let mut refreshed = token.into_bundle();
        // A refresh response may omit the refresh token; the old one stays valid.
        if refreshed.refresh_secret.is_none() {
            refreshed.refresh_secret = bundle.refresh_secret.clone();
        }
        Ok(refreshed)
    }

    async fn fetch_profile(&self, bundle: &CredentialBundle) -> Result<Value, FetchError> {
        let url = format!(
            "{}/oauth2/v2/userinfo",
            self.api_base().trim_end_matches('/')
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&bundle.access_secret)
            .send()
            .await
            .map_err(|e| FetchError::transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::transient(format!("malformed userinfo response: {e}")))
    }

    async fn fetch_content(
        &self,
        bundle: &CredentialBundle,
    ) -> Result<Vec<ContentDraft>, FetchError> {
        let url = format!("{}/drive/v3/files", self.api_base().trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[
                ("pageSize", "50"),
                ("fields", "files(id,name,mimeType,modifiedTime,webViewLink)"),
            ])
            .bearer_auth(&bundle.access_secret)
            .send()
            .await
            .map_err(|e| FetchError::transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::transient(format!("malformed files response: {e}")))?;

        let files = body
            .get("files")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut drafts = Vec::with_capacity(files.len());
        for file in files {
            let Some(external_id) = file.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            drafts.push(ContentDraft {
                external_id: external_id.to_string(),
                kind: "file".to_string(),
                payload: file.clone(),
            });
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_requests_offline_access() {
        let handler = GoogleHandler::new(
            PlatformCredentials {
                client_id: Some("google-client".to_string()),
                client_secret: Some("google-secret".to_string()),
                auth_base: None,
                api_base: None,
            },
            reqwest::Client::new(),
        );
        let url = handler
            .build_auth_url("sealed-state", "https://broker.test/callback")
            .expect("auth url");
        assert!(url.as_str().starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("access_type".to_string(), "offline".to_string())));
        assert!(pairs.contains(&("state".to_string(), "sealed-state".to_string())));
    }

    #[test]
    fn token_response_maps_scopes() {
        let token = TokenResponse {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_in: Some(3600),
            scope: Some("openid email".to_string()),
            token_type: Some("Bearer".to_string()),
        };
        let bundle = token.into_bundle();
        assert_eq!(bundle.platform, "google");
        assert_eq!(bundle.scopes, vec!["openid", "email"]);
        assert_eq!(bundle.refresh_secret.as_deref(), Some("rt"));
        assert!(bundle.expires_at.is_some());
        assert_eq!(
            bundle.metadata.get("token_type").and_then(|v| v.as_str()),
            Some("Bearer")
        );
    }
}

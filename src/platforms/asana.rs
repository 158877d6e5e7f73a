//! Asana platform handler
//!
//! OAuth against app.asana.com; sync discovers the first workspace and pulls
//! the authorized user's tasks from it.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::config::PlatformCredentials;
use crate::platforms::handler::{
    ContentDraft, CredentialBundle, ExchangeError, FetchError, PlatformHandler,
};

const KEY: &str = "asana";
const DEFAULT_AUTH_BASE: &str = "https://app.asana.com";
const DEFAULT_API_BASE: &str = "https://app.asana.com";

/// Asana platform handler
pub struct AsanaHandler {
    creds: PlatformCredentials,
    http: reqwest::Client,
}

impl AsanaHandler {
    pub fn new(creds: PlatformCredentials, http: reqwest::Client) -> Self {
        Self { creds, http }
    }

    fn auth_base(&self) -> &str {
        self.creds.auth_base.as_deref().unwrap_or(DEFAULT_AUTH_BASE)
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

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ExchangeError> {
        let url = format!("{}/-/oauth_token", self.auth_base().trim_end_matches('/'));
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

    async fn api_get(&self, path: &str, bundle: &CredentialBundle) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.api_base().trim_end_matches('/'), path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&bundle.access_secret)
            .header("Accept", "application/json")
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
            .map_err(|e| FetchError::transient(format!("malformed response from {path}: {e}")))
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Asana returns the authorized user inline.
    #[serde(default)]
    data: Option<Value>,
}

impl TokenResponse {
    fn into_bundle(self) -> CredentialBundle {
        let mut metadata = Map::new();
        if let Some(data) = &self.data {
            if let Some(gid) = data.get("gid").and_then(|v| v.as_str()) {
                metadata.insert("user_gid".to_string(), Value::String(gid.to_string()));
            }
            if let Some(name) = data.get("name").and_then(|v| v.as_str()) {
                metadata.insert("user_name".to_string(), Value::String(name.to_string()));
            }
        }
        CredentialBundle {
            platform: KEY.to_string(),
            access_secret: self.access_token,
            refresh_secret: self.refresh_token,
            expires_at: self.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            scopes: vec!["default".to_string()],
            metadata,
        }
    }
}

#[async_trait]
impl PlatformHandler for AsanaHandler {
    fn key(&self) -> &'static str {
        KEY
    }

    fn build_auth_url(&self, state: &str, redirect_uri: &str) -> Result<Url, ExchangeError> {
        let (client_id, _) = self.client_pair()?;
        let mut url = Url::parse(&format!(
            "{}/-/oauth_authorize",
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
            .append_pair("response_type", "code");
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
                ("grant_type", "authorization_code"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
            .await?;

        debug!(has_refresh = token.refresh_token.is_some(), "Asana token exchange succeeded");
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
                ("grant_type", "refresh_token"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_secret),
            ])
            .await?;

        let mut refreshed = token.into_bundle();
        if refreshed.refresh_secret.is_none() {
            refreshed.refresh_secret = bundle.refresh_secret.clone();
        }
        // Keep the identity metadata discovered at exchange time.
        if refreshed.metadata.is_empty() {
            refreshed.metadata = bundle.metadata.clone();
        }
        Ok(refreshed)
    }

    async fn fetch_profile(&self, bundle: &CredentialBundle) -> Result<Value, FetchError> {
        let body = self.api_get("/api/1.0/users/me", bundle).await?;
        Ok(body.get("data").cloned().unwrap_or(body))
    }

    async fn fetch_content(
        &self,
        bundle: &CredentialBundle,
    ) -> Result<Vec<ContentDraft>, FetchError> {
        // Tasks are scoped to a workspace, so discover one first.
        let workspaces = self.api_get("/api/1.0/workspaces", bundle).await?;
        let workspace_gid = workspaces
            .get("data")
            .and_then(|v| v.as_array())
            .and_then(|list| list.first())
            .and_then(|ws| ws.get("gid"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| FetchError::permanent("no accessible Asana workspaces"))?
            .to_string();

        let path = format!(
            "/api/1.0/tasks?assignee=me&workspace={workspace_gid}&limit=50&opt_fields=gid,name,completed,modified_at,permalink_url"
        );
        let body = self.api_get(&path, bundle).await?;

        let tasks = body
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut drafts = Vec::with_capacity(tasks.len());
        for task in tasks {
            let Some(external_id) = task.get("gid").and_then(|v| v.as_str()) else {
                continue;
            };
            drafts.push(ContentDraft {
                external_id: external_id.to_string(),
                kind: "task".to_string(),
                payload: task.clone(),
            });
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_url_targets_asana_authorize_endpoint() {
        let handler = AsanaHandler::new(
            PlatformCredentials {
                client_id: Some("asana-client".to_string()),
                client_secret: Some("asana-secret".to_string()),
                auth_base: None,
                api_base: None,
            },
            reqwest::Client::new(),
        );
        let url = handler
            .build_auth_url("sealed-state", "https://broker.test/callback")
            .expect("auth url");
        assert!(url.as_str().starts_with("https://app.asana.com/-/oauth_authorize"));
    }

    #[test]
    fn token_response_extracts_identity_metadata() {
        let token = TokenResponse {
            access_token: "at".to_string(),
            refresh_token: Some("rt".to_string()),
            expires_in: Some(3600),
            data: Some(serde_json::json!({"gid": "12345", "name": "Test User"})),
        };
        let bundle = token.into_bundle();
        assert_eq!(
            bundle.metadata.get("user_gid").and_then(|v| v.as_str()),
            Some("12345")
        );
        assert_eq!(
            bundle.metadata.get("user_name").and_then(|v| v.as_str()),
            Some("Test User")
        );
    }
}

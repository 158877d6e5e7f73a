//! Meta (Facebook/Instagram) platform handler
//!
//! Exchanges codes against the Graph API token endpoint and pulls the
//! authorized account's posts during sync.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::config::PlatformCredentials;
use crate::platforms::handler::{
    ContentDraft, CredentialBundle, ExchangeError, FetchError, PlatformHandler,
};

const KEY: &str = "meta";
const DEFAULT_AUTH_BASE: &str = "https://www.facebook.com";
const DEFAULT_API_BASE: &str = "https://graph.facebook.com";
const GRAPH_VERSION: &str = "v19.0";
const DEFAULT_SCOPES: &str = "public_profile,pages_read_engagement,instagram_basic";

/// Meta platform handler
pub struct MetaHandler {
    creds: PlatformCredentials,
    http: reqwest::Client,
}

impl MetaHandler {
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
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[async_trait]
impl PlatformHandler for MetaHandler {
    fn key(&self) -> &'static str {
        KEY
    }

    fn build_auth_url(&self, state: &str, redirect_uri: &str) -> Result<Url, ExchangeError> {
        let (client_id, _) = self.client_pair()?;
        let mut url = Url::parse(&format!(
            "{}/{}/dialog/oauth",
            self.auth_base().trim_end_matches('/'),
            GRAPH_VERSION
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
            .append_pair("scope", DEFAULT_SCOPES);
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<CredentialBundle, ExchangeError> {
        let (client_id, client_secret) = self.client_pair()?;

        // The Graph API token endpoint takes its parameters as a query string.
        let url = format!(
            "{}/{}/oauth/access_token",
            self.api_base().trim_end_matches('/'),
            GRAPH_VERSION
        );
        let response = self
            .http
            .get(&url)
            .query(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("code", code),
            ])
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

        let token: TokenResponse =
            response.json().await.map_err(|e| ExchangeError::Malformed {
                platform: KEY.to_string(),
                details: e.to_string(),
            })?;

        debug!(expires_in = ?token.expires_in, "Meta token exchange succeeded");

        Ok(CredentialBundle {
            platform: KEY.to_string(),
            access_secret: token.access_token,
            // Graph API issues no refresh token; long-lived tokens are
            // re-minted through a fresh authorization.
            refresh_secret: None,
            expires_at: token.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            scopes: DEFAULT_SCOPES.split(',').map(|s| s.to_string()).collect(),
            metadata: Map::new(),
        })
    }

    async fn refresh(&self, _bundle: &CredentialBundle) -> Result<CredentialBundle, ExchangeError> {
        Err(ExchangeError::RefreshUnsupported {
            platform: KEY.to_string(),
        })
    }

    async fn fetch_profile(&self, bundle: &CredentialBundle) -> Result<Value, FetchError> {
        let url = format!(
            "{}/{}/me",
            self.api_base().trim_end_matches('/'),
            GRAPH_VERSION
        );
        let response = self
            .http
            .get(&url)
            .query(&[("fields", "id,name")])
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
            .map_err(|e| FetchError::transient(format!("malformed profile response: {e}")))
    }

    async fn fetch_content(
        &self,
        bundle: &CredentialBundle,
    ) -> Result<Vec<ContentDraft>, FetchError> {
        let url = format!(
            "{}/{}/me/posts",
            self.api_base().trim_end_matches('/'),
            GRAPH_VERSION
        );
        let response = self
            .http
            .get(&url)
            .query(&[
                ("fields", "id,message,created_time,permalink_url"),
                ("limit", "50"),
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
            .map_err(|e| FetchError::transient(format!("malformed posts response: {e}")))?;

        let posts = body
            .get("data")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut drafts = Vec::with_capacity(posts.len());
        for post in posts {
            let Some(external_id) = post.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            drafts.push(ContentDraft {
                external_id: external_id.to_string(),
                kind: "post".to_string(),
                payload: post.clone(),
            });
        }
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> MetaHandler {
        MetaHandler::new(
            PlatformCredentials {
                client_id: Some("meta-client".to_string()),
                client_secret: Some("meta-secret".to_string()),
                auth_base: None,
                api_base: None,
            },
            reqwest::Client::new(),
        )
    }

    #[test]
    fn auth_url_carries_state_and_client() {
        let url = handler()
            .build_auth_url("sealed-state", "https://broker.test/callback")
            .expect("auth url");
        assert!(url.as_str().starts_with("https://www.facebook.com/v19.0/dialog/oauth"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_id".to_string(), "meta-client".to_string())));
        assert!(pairs.contains(&("state".to_string(), "sealed-state".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
    }

    #[test]
    fn missing_client_credentials_surface_as_configuration_failure() {
        let bare = MetaHandler::new(PlatformCredentials::default(), reqwest::Client::new());
        assert!(matches!(
            bare.build_auth_url("s", "https://broker.test/callback"),
            Err(ExchangeError::MissingClientCredentials { .. })
        ));
    }
}

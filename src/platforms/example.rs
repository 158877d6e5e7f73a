//! Example platform handler
//!
//! Deterministic stub used in local profiles and tests: no network calls,
//! every operation succeeds with predictable data.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use url::Url;

use crate::platforms::handler::{
    ContentDraft, CredentialBundle, ExchangeError, FetchError, PlatformHandler,
};

const KEY: &str = "example";

/// Example platform handler
#[derive(Default)]
pub struct ExampleHandler;

impl ExampleHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PlatformHandler for ExampleHandler {
    fn key(&self) -> &'static str {
        KEY
    }

    fn build_auth_url(&self, state: &str, redirect_uri: &str) -> Result<Url, ExchangeError> {
        let mut url =
            Url::parse("https://example.com/oauth/authorize").map_err(|e| {
                ExchangeError::Malformed {
                    platform: KEY.to_string(),
                    details: e.to_string(),
                }
            })?;
        url.query_pairs_mut()
            .append_pair("client_id", "example-client")
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("state", state)
            .append_pair("response_type", "code");
        Ok(url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<CredentialBundle, ExchangeError> {
        if code.is_empty() {
            return Err(ExchangeError::Rejected {
                platform: KEY.to_string(),
                status: 400,
                body: Some("empty code".to_string()),
            });
        }
        let mut metadata = Map::new();
        metadata.insert(
            "account_id".to_string(),
            Value::String("example-account-1".to_string()),
        );
        Ok(CredentialBundle {
            platform: KEY.to_string(),
            access_secret: format!("example-access-{code}"),
            refresh_secret: Some(format!("example-refresh-{code}")),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scopes: vec!["read".to_string(), "write".to_string()],
            metadata,
        })
    }

    async fn refresh(&self, bundle: &CredentialBundle) -> Result<CredentialBundle, ExchangeError> {
        let refresh_secret =
            bundle
                .refresh_secret
                .clone()
                .ok_or_else(|| ExchangeError::RefreshUnsupported {
                    platform: KEY.to_string(),
                })?;
        Ok(CredentialBundle {
            platform: KEY.to_string(),
            access_secret: format!("{}-refreshed", bundle.access_secret),
            refresh_secret: Some(refresh_secret),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scopes: bundle.scopes.clone(),
            metadata: bundle.metadata.clone(),
        })
    }

    async fn fetch_profile(&self, _bundle: &CredentialBundle) -> Result<Value, FetchError> {
        Ok(json!({
            "id": "example-account-1",
            "name": "Example Account",
        }))
    }

    async fn fetch_content(
        &self,
        _bundle: &CredentialBundle,
    ) -> Result<Vec<ContentDraft>, FetchError> {
        Ok((1..=3)
            .map(|n| ContentDraft {
                external_id: format!("example-post-{n}"),
                kind: "post".to_string(),
                payload: json!({
                    "id": format!("example-post-{n}"),
                    "message": format!("Example post number {n}"),
                }),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exchange_and_refresh_are_deterministic() {
        let handler = ExampleHandler::new();
        let bundle = handler
            .exchange_code("abc", "https://broker.test/callback")
            .await
            .expect("exchange");
        assert_eq!(bundle.access_secret, "example-access-abc");
        assert_eq!(bundle.refresh_secret.as_deref(), Some("example-refresh-abc"));

        let refreshed = handler.refresh(&bundle).await.expect("refresh");
        assert_eq!(refreshed.access_secret, "example-access-abc-refreshed");
    }

    #[tokio::test]
    async fn empty_code_is_rejected() {
        let handler = ExampleHandler::new();
        let result = handler.exchange_code("", "https://broker.test/callback").await;
        assert!(matches!(result, Err(ExchangeError::Rejected { status: 400, .. })));
    }

    #[tokio::test]
    async fn content_listing_is_stable() {
        let handler = ExampleHandler::new();
        let bundle = handler
            .exchange_code("abc", "https://broker.test/callback")
            .await
            .expect("exchange");
        let drafts = handler.fetch_content(&bundle).await.expect("content");
        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].external_id, "example-post-1");
        assert_eq!(drafts[0].kind, "post");
    }
}

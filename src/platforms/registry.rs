//! Platform handler registry
//!
//! Closed set of platform handlers built once at startup from the enabled
//! platform list. An enabled key with no handler refuses to start the
//! process; an unknown key at request time is a not-found, never a panic.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{AppConfig, ConfigError};
use crate::platforms::{
    asana::AsanaHandler, example::ExampleHandler, google::GoogleHandler, meta::MetaHandler,
    PlatformHandler,
};

/// Error type for registry lookups
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("platform '{key}' is not enabled")]
    PlatformNotFound { key: String },
}

/// Registry mapping platform keys to their handlers.
///
/// An explicit instance carried in application state; there is no global.
#[derive(Clone)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn PlatformHandler>>,
}

impl Registry {
    /// Build the registry from the enabled platform list.
    ///
    /// Every key in `enabled_platforms` must name a known handler; anything
    /// else is a fatal configuration error.
    pub fn from_config(config: &AppConfig, http: reqwest::Client) -> Result<Self, ConfigError> {
        let mut handlers: HashMap<String, Arc<dyn PlatformHandler>> = HashMap::new();

        for key in &config.enabled_platforms {
            let creds = config.platform(key).cloned().unwrap_or_default();
            let handler: Arc<dyn PlatformHandler> = match key.as_str() {
                "meta" => Arc::new(MetaHandler::new(creds, http.clone())),
                "google" => Arc::new(GoogleHandler::new(creds, http.clone())),
                "asana" => Arc::new(AsanaHandler::new(creds, http.clone())),
                "example" => Arc::new(ExampleHandler::new()),
                unknown => {
                    return Err(ConfigError::UnknownPlatform {
                        platform: unknown.to_string(),
                    });
                }
            };
            handlers.insert(key.clone(), handler);
        }

        Ok(Self { handlers })
    }

    /// Get a handler by platform key.
    pub fn get(&self, key: &str) -> Result<Arc<dyn PlatformHandler>, RegistryError> {
        self.handlers
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::PlatformNotFound {
                key: key.to_string(),
            })
    }

    /// Enabled platform keys, sorted for stable ordering.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handlers.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn config_with(platforms: &[&str]) -> AppConfig {
        AppConfig {
            enabled_platforms: platforms.iter().map(|s| s.to_string()).collect(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn builds_all_known_handlers() {
        let config = config_with(&["meta", "google", "asana", "example"]);
        let registry = Registry::from_config(&config, reqwest::Client::new()).expect("registry");
        assert_eq!(registry.keys(), vec!["asana", "example", "google", "meta"]);
        assert_eq!(registry.get("meta").expect("meta").key(), "meta");
    }

    #[test]
    fn unknown_enabled_key_is_fatal() {
        let config = config_with(&["example", "myspace"]);
        let result = Registry::from_config(&config, reqwest::Client::new());
        assert!(matches!(
            result,
            Err(ConfigError::UnknownPlatform { platform }) if platform == "myspace"
        ));
    }

    #[test]
    fn disabled_key_is_not_found_at_lookup() {
        let config = config_with(&["example"]);
        let registry = Registry::from_config(&config, reqwest::Client::new()).expect("registry");
        assert!(matches!(
            registry.get("meta"),
            Err(RegistryError::PlatformNotFound { key }) if key == "meta"
        ));
    }
}

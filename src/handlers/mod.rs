//! # API Handlers
//!
//! HTTP endpoint handlers for the broker API.

pub mod credentials;
pub mod health;
pub mod jobs;
pub mod oauth;
pub mod tenants;

use axum::response::Json;
use serde::Serialize;

/// Basic service information returned at the root path.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Root handler that returns basic service information
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

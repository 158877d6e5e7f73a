//! Shared fixtures for integration tests: in-memory database, vault, and
//! application state wiring.

use std::sync::Arc;

use anyhow::Result;
use broker::config::AppConfig;
use broker::migration::{Migrator, MigratorTrait};
use broker::platforms::Registry;
use broker::repositories::TenantRepository;
use broker::server::AppState;
use broker::vault::{Vault, VaultKey};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

#[allow(dead_code)]
pub const ADMIN_TOKEN: &str = "test-admin-token";

pub const TEST_VAULT_KEY: [u8; 32] = [7u8; 32];

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;

    Migrator::up(&db, None).await?;

    // SQLite does not enforce our Postgres foreign key semantics; disable FK
    // checks so fixtures can be inserted without the full relation graph.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = OFF".to_string(),
    ))
    .await?;

    Ok(db)
}

/// Base configuration for tests: test profile, the stub platform enabled,
/// fast delivery retries.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    let mut config = AppConfig {
        profile: "test".to_string(),
        admin_tokens: vec![ADMIN_TOKEN.to_string()],
        vault_key: Some(TEST_VAULT_KEY.to_vec()),
        landing_url: "http://landing.test/connected".to_string(),
        ..AppConfig::default()
    };
    config.delivery.max_attempts = 3;
    config.delivery.backoff_base_ms = 1;
    config.delivery.backoff_cap_ms = 4;
    config.delivery.timeout_seconds = 5;
    config
}

#[allow(dead_code)]
pub fn test_vault() -> Vault {
    Vault::new(VaultKey::new(TEST_VAULT_KEY.to_vec()).expect("32-byte test key"))
}

/// Builds full application state over a fresh in-memory database.
#[allow(dead_code)]
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    let config = Arc::new(config);
    let db = setup_test_db().await?;
    let http = reqwest::Client::new();
    let registry = Registry::from_config(&config, http.clone())?;
    Ok(AppState::new(config, db, test_vault(), registry, http))
}

/// Registers a tenant and returns its id.
#[allow(dead_code)]
pub async fn register_tenant(
    db: &DatabaseConnection,
    endpoint_url: &str,
    shared_secret: &str,
) -> Result<Uuid> {
    let tenant = TenantRepository::new(db.clone())
        .upsert(
            Uuid::new_v4(),
            Some("Test Tenant".to_string()),
            endpoint_url.to_string(),
            shared_secret.to_string(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("tenant upsert failed: {}", e.message))?;
    Ok(tenant.id)
}

//! # Credential Broker Entry Point
//!
//! Loads configuration, runs migrations, and starts the API server alongside
//! the sync and enrichment workers under one cancellation token.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use broker::config::ConfigLoader;
use broker::migration::{Migrator, MigratorTrait};
use broker::platforms::Registry;
use broker::server::{run_server, AppState};
use broker::telemetry;
use broker::vault::{Vault, VaultKey};
use broker::workers::{EnrichmentWorker, SyncWorker, TextEnricher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new().load().context("configuration error")?;

    telemetry::init_tracing(&config)?;

    tracing::info!(profile = config.profile, "Configuration loaded");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = redacted_json, "Effective configuration");
    }

    let db = broker::db::init_pool(&config).await?;
    Migrator::up(&db, None).await.context("migration failed")?;

    let key_bytes = config
        .vault_key
        .clone()
        .context("vault key missing after validation")?;
    let vault = Vault::new(VaultKey::new(key_bytes)?);

    let http = reqwest::Client::builder()
        .user_agent(concat!("broker/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let config = Arc::new(config);
    let registry = Registry::from_config(&config, http.clone())?;
    let state = AppState::new(
        Arc::clone(&config),
        db.clone(),
        vault.clone(),
        registry.clone(),
        http,
    );

    let shutdown = CancellationToken::new();

    let sync_worker = SyncWorker::new(
        Arc::clone(&config),
        registry,
        format!("sync-{}", &uuid::Uuid::new_v4().to_string()[..8]),
        state.sync_jobs(),
        state.enrichment_jobs(),
        state.credentials(),
        state.content(),
    );
    let sync_handle = tokio::spawn(sync_worker.run(shutdown.clone()));

    let enrichment_worker = EnrichmentWorker::new(
        Arc::clone(&config),
        format!("enrich-{}", &uuid::Uuid::new_v4().to_string()[..8]),
        state.enrichment_jobs(),
        state.content(),
        std::sync::Arc::new(TextEnricher::default()),
    );
    let enrichment_handle = tokio::spawn(enrichment_worker.run(shutdown.clone()));

    let server_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            server_shutdown.cancel();
        }
    });

    let result = run_server(state, shutdown.clone()).await;

    // Make sure the workers stop even if the server loop errored out.
    shutdown.cancel();
    let _ = sync_handle.await;
    let _ = enrichment_handle.await;

    result
}

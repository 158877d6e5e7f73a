//! # Sync Worker
//!
//! Background executor for sync jobs: reclaims stale claims, claims pending
//! jobs under the atomic claim protocol, refreshes expiring tokens, pulls
//! profile and content from the platform, upserts content items, and queues
//! enrichment for anything new or changed.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use metrics::{counter, histogram};
use serde_json::json;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::models::sync_job::Model as SyncJobModel;
use crate::platforms::{CredentialBundle, FetchError, Registry};
use crate::repositories::{
    ContentRepository, CredentialRepository, EnrichmentJobRepository, SyncJobRepository,
};

/// Background sync job executor.
#[derive(Clone)]
pub struct SyncWorker {
    config: Arc<AppConfig>,
    registry: Registry,
    worker_id: String,
    sync_jobs: SyncJobRepository,
    enrichment_jobs: EnrichmentJobRepository,
    credentials: CredentialRepository,
    content: ContentRepository,
}

impl SyncWorker {
    pub fn new(
        config: Arc<AppConfig>,
        registry: Registry,
        worker_id: String,
        sync_jobs: SyncJobRepository,
        enrichment_jobs: EnrichmentJobRepository,
        credentials: CredentialRepository,
        content: ContentRepository,
    ) -> Self {
        Self {
            config,
            registry,
            worker_id,
            sync_jobs,
            enrichment_jobs,
            credentials,
            content,
        }
    }

    /// Run the poll loop until the shutdown token fires.
    #[instrument(skip_all, fields(worker_id = %self.worker_id))]
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting sync worker");
        let poll_interval = Duration::from_secs(self.config.sync_worker.poll_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sync worker shutdown requested");
                    break;
                }
                _ = sleep(poll_interval) => {
                    let started = Instant::now();
                    if let Err(err) = self.tick().await {
                        error!(error = ?err, "Sync worker tick failed");
                    }
                    histogram!("sync_worker_tick_duration_ms")
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Sync worker stopped");
    }

    /// One poll cycle: recover stale claims, then run up to `concurrency`
    /// claimed jobs in parallel.
    pub async fn tick(&self) -> Result<(), crate::error::ApiError> {
        let now = Utc::now();

        let reclaimed = self
            .sync_jobs
            .reclaim_stale(self.config.sync_worker.max_processing_seconds, now)
            .await?;
        if reclaimed > 0 {
            counter!("sync_jobs_reclaimed_total").increment(reclaimed);
        }

        let mut claimed = Vec::new();
        for _ in 0..self.config.sync_worker.concurrency {
            match self.sync_jobs.claim(&self.worker_id, Utc::now()).await? {
                Some(job) => claimed.push(job),
                None => break,
            }
        }

        if claimed.is_empty() {
            debug!("No eligible sync jobs");
            return Ok(());
        }

        let mut handles = Vec::with_capacity(claimed.len());
        for job in claimed {
            let worker = self.clone();
            handles.push(tokio::spawn(async move { worker.run_job(job).await }));
        }
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = ?err, "Sync job task panicked");
            }
        }

        Ok(())
    }

    /// Execute one claimed job to a terminal or rescheduled state.
    #[instrument(skip(self, job), fields(job_id = %job.id, platform = %job.platform))]
    pub async fn run_job(&self, job: SyncJobModel) {
        let labels = [("platform", job.platform.clone())];
        match self.execute(&job).await {
            Ok(items) => {
                counter!("sync_jobs_completed_total", &labels).increment(1);
                info!(items = items, "Sync job completed");
                if let Err(err) = self.sync_jobs.complete(job, Utc::now()).await {
                    error!(error = ?err, "Failed to mark sync job completed");
                }
            }
            Err(fetch_error) => {
                counter!("sync_jobs_failed_total", &labels).increment(1);
                warn!(error = %fetch_error, attempts = job.attempts, "Sync job attempt failed");
                let detail = serde_json::to_value(&fetch_error)
                    .unwrap_or_else(|_| json!({ "message": fetch_error.to_string() }));
                if let Err(err) = self
                    .sync_jobs
                    .fail_or_reschedule(
                        job,
                        detail,
                        self.config.sync_worker.max_attempts,
                        self.config.sync_worker.backoff_base_seconds,
                        Utc::now(),
                    )
                    .await
                {
                    error!(error = ?err, "Failed to record sync job failure");
                }
            }
        }
    }

    async fn execute(&self, job: &SyncJobModel) -> Result<usize, FetchError> {
        let handler = self
            .registry
            .get(&job.platform)
            .map_err(|e| FetchError::permanent(e.to_string()))?;

        let credential = self
            .credentials
            .get_decrypted(job.tenant_id, &job.platform, &self.worker_id)
            .await
            .map_err(|e| FetchError::transient(e.message.to_string()))?
            .ok_or_else(|| {
                FetchError::unauthorized(format!(
                    "no credential stored for platform {}",
                    job.platform
                ))
            })?;

        let bundle = self
            .refresh_if_expiring(job.tenant_id, credential.into_bundle())
            .await;

        let profile = handler.fetch_profile(&bundle).await?;
        debug!(
            profile_id = profile.get("id").and_then(|v| v.as_str()).unwrap_or("unknown"),
            "Platform profile fetched"
        );

        let drafts = handler.fetch_content(&bundle).await?;
        let mut stored = 0usize;

        for draft in &drafts {
            let (item, changed) = self
                .content
                .upsert_draft(job.tenant_id, &job.platform, draft, Utc::now())
                .await
                .map_err(|e| FetchError::transient(e.message.to_string()))?;
            stored += 1;

            if changed {
                self.enrichment_jobs
                    .enqueue(job.tenant_id, item.id, &item.kind)
                    .await
                    .map_err(|e| FetchError::transient(e.message.to_string()))?;
            }
        }

        Ok(stored)
    }

    /// Refresh the bundle when it expires inside the configured lead window.
    ///
    /// A failed refresh falls back to the current bundle; if that token is
    /// truly dead the fetch fails and the normal retry path takes over.
    async fn refresh_if_expiring(
        &self,
        tenant_id: uuid::Uuid,
        bundle: CredentialBundle,
    ) -> CredentialBundle {
        let lead = ChronoDuration::seconds(self.config.token_refresh.lead_seconds as i64);
        let expiring = bundle
            .expires_at
            .map(|at| at <= Utc::now() + lead)
            .unwrap_or(false);

        if !expiring || bundle.refresh_secret.is_none() {
            return bundle;
        }

        let handler = match self.registry.get(&bundle.platform) {
            Ok(handler) => handler,
            Err(_) => return bundle,
        };

        match handler.refresh(&bundle).await {
            Ok(refreshed) => {
                info!(platform = bundle.platform, "Access token refreshed");
                counter!(
                    "token_refresh_total",
                    &[("platform", bundle.platform.clone())]
                )
                .increment(1);
                // Same transactional path as OAuth completion.
                match self.credentials.upsert_bundle(tenant_id, &refreshed, true).await {
                    Ok(_) => refreshed,
                    Err(err) => {
                        error!(error = ?err, "Failed to persist refreshed token");
                        refreshed
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, platform = bundle.platform, "Token refresh failed");
                bundle
            }
        }
    }
}

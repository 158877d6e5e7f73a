//! # Enrichment Worker
//!
//! Claims enrichment jobs and derives transcript and embedding for the
//! referenced content item through the injected [`Enricher`]. The actual AI
//! service lives behind the trait; the broker only schedules, retries, and
//! writes results back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, histogram};
use serde_json::json;
use thiserror::Error;
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::models::content_item::Model as ContentModel;
use crate::models::enrichment_job::Model as EnrichmentJobModel;
use crate::repositories::{ContentRepository, EnrichmentJobRepository};

/// Enrichment failure; always retried up to the configured ceiling.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct EnrichmentError(pub String);

/// Derived fields for a content item.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub transcript: Option<String>,
    pub embedding: Option<Vec<f64>>,
}

/// Derivation backend injected into the worker.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, item: &ContentModel) -> Result<Enrichment, EnrichmentError>;
}

/// Deterministic local enricher: transcript from the payload's text fields,
/// embedding from character frequencies. Stands in where no AI service is
/// wired up (local profile, tests).
#[derive(Default)]
pub struct TextEnricher;

const TEXT_FIELDS: &[&str] = &["message", "text", "name", "title", "caption", "description"];
const EMBEDDING_DIMS: usize = 16;

#[async_trait]
impl Enricher for TextEnricher {
    async fn enrich(&self, item: &ContentModel) -> Result<Enrichment, EnrichmentError> {
        let mut parts = Vec::new();
        for field in TEXT_FIELDS {
            if let Some(text) = item.payload.get(field).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
        }

        let transcript = if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        };

        let embedding = transcript.as_deref().map(|text| {
            let mut buckets = vec![0f64; EMBEDDING_DIMS];
            for byte in text.bytes() {
                buckets[(byte as usize) % EMBEDDING_DIMS] += 1.0;
            }
            let norm = buckets.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for value in &mut buckets {
                    *value /= norm;
                }
            }
            buckets
        });

        Ok(Enrichment {
            transcript,
            embedding,
        })
    }
}

/// Background enrichment job executor.
pub struct EnrichmentWorker {
    config: Arc<AppConfig>,
    worker_id: String,
    jobs: EnrichmentJobRepository,
    content: ContentRepository,
    enricher: Arc<dyn Enricher>,
}

impl EnrichmentWorker {
    pub fn new(
        config: Arc<AppConfig>,
        worker_id: String,
        jobs: EnrichmentJobRepository,
        content: ContentRepository,
        enricher: Arc<dyn Enricher>,
    ) -> Self {
        Self {
            config,
            worker_id,
            jobs,
            content,
            enricher,
        }
    }

    /// Run the poll loop until the shutdown token fires.
    #[instrument(skip_all, fields(worker_id = %self.worker_id))]
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Starting enrichment worker");
        let poll_interval =
            Duration::from_secs(self.config.enrichment_worker.poll_interval_seconds);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Enrichment worker shutdown requested");
                    break;
                }
                _ = sleep(poll_interval) => {
                    let started = Instant::now();
                    if let Err(err) = self.tick().await {
                        error!(error = ?err, "Enrichment worker tick failed");
                    }
                    histogram!("enrichment_worker_tick_duration_ms")
                        .record(started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Enrichment worker stopped");
    }

    /// One poll cycle: recover stale claims, then drain eligible jobs.
    pub async fn tick(&self) -> Result<(), crate::error::ApiError> {
        let now = Utc::now();

        let reclaimed = self
            .jobs
            .reclaim_stale(self.config.enrichment_worker.max_processing_seconds, now)
            .await?;
        if reclaimed > 0 {
            counter!("enrichment_jobs_reclaimed_total").increment(reclaimed);
        }

        loop {
            let Some(job) = self.jobs.claim(&self.worker_id, Utc::now()).await? else {
                debug!("No eligible enrichment jobs");
                return Ok(());
            };
            self.run_job(job).await;
        }
    }

    /// Execute one claimed job to a terminal or rescheduled state.
    #[instrument(skip(self, job), fields(job_id = %job.id, content_id = %job.content_id))]
    pub async fn run_job(&self, job: EnrichmentJobModel) {
        match self.execute(&job).await {
            Ok(()) => {
                counter!("enrichment_jobs_completed_total").increment(1);
                info!("Enrichment job completed");
                if let Err(err) = self.jobs.complete(job, Utc::now()).await {
                    error!(error = ?err, "Failed to mark enrichment job completed");
                }
            }
            Err(enrichment_error) => {
                counter!("enrichment_jobs_failed_total").increment(1);
                warn!(
                    error = %enrichment_error,
                    attempts = job.attempts,
                    "Enrichment job attempt failed"
                );
                if let Err(err) = self
                    .jobs
                    .fail_or_reschedule(
                        job,
                        enrichment_error.0,
                        self.config.enrichment_worker.max_attempts,
                        self.config.enrichment_worker.poll_interval_seconds,
                        Utc::now(),
                    )
                    .await
                {
                    error!(error = ?err, "Failed to record enrichment job failure");
                }
            }
        }
    }

    async fn execute(&self, job: &EnrichmentJobModel) -> Result<(), EnrichmentError> {
        let item = self
            .content
            .find_by_id(job.content_id)
            .await
            .map_err(|e| EnrichmentError(e.message.to_string()))?
            .ok_or_else(|| {
                EnrichmentError(format!("content item {} no longer exists", job.content_id))
            })?;

        let derived = self.enricher.enrich(&item).await?;

        let embedding = derived.embedding.map(|vector| json!(vector));
        self.content
            .write_enrichment(item.id, derived.transcript, embedding, Utc::now())
            .await
            .map_err(|e| EnrichmentError(e.message.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item_with_payload(payload: serde_json::Value) -> ContentModel {
        let now = Utc::now().fixed_offset();
        ContentModel {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            platform: "example".to_string(),
            external_id: "example-post-1".to_string(),
            kind: "post".to_string(),
            payload,
            transcript: None,
            embedding: None,
            enriched_at: None,
            synced_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn text_enricher_builds_transcript_and_embedding() {
        let item = item_with_payload(json!({
            "message": "Launch day recap",
            "title": "Recap",
        }));

        let derived = TextEnricher.enrich(&item).await.expect("enrich");
        let transcript = derived.transcript.expect("transcript");
        assert!(transcript.contains("Launch day recap"));
        assert!(transcript.contains("Recap"));

        let embedding = derived.embedding.expect("embedding");
        assert_eq!(embedding.len(), EMBEDDING_DIMS);
        let norm: f64 = embedding.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn text_enricher_handles_textless_payload() {
        let item = item_with_payload(json!({ "id": "42", "metrics": { "likes": 3 } }));

        let derived = TextEnricher.enrich(&item).await.expect("enrich");
        assert!(derived.transcript.is_none());
        assert!(derived.embedding.is_none());
    }
}

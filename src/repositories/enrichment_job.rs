//! # EnrichmentJob Repository
//!
//! Queue operations for the enrichment_jobs table. Enqueue is idempotent:
//! the unique (tenant_id, content_id, content_type) constraint makes a
//! duplicate enqueue a no-op rather than an error.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::error::{is_unique_violation, ApiError};
use crate::models::enrichment_job::{ActiveModel, Column, Entity, Model};
use crate::models::sync_job::{STATUS_COMPLETED, STATUS_FAILED, STATUS_PENDING, STATUS_PROCESSING};

/// Repository for enrichment job database operations
#[derive(Clone)]
pub struct EnrichmentJobRepository {
    db: DatabaseConnection,
}

impl EnrichmentJobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enqueue an enrichment job for a content item. Returns `None` when a
    /// job for this (tenant, content, content_type) already exists.
    pub async fn enqueue(
        &self,
        tenant_id: Uuid,
        content_id: Uuid,
        content_type: &str,
    ) -> Result<Option<Model>, ApiError> {
        let now = Utc::now().fixed_offset();
        let id = Uuid::new_v4();

        let job = ActiveModel {
            id: Set(id),
            tenant_id: Set(tenant_id),
            content_id: Set(content_id),
            content_type: Set(content_type.to_string()),
            status: Set(STATUS_PENDING.to_string()),
            attempts: Set(0),
            error_message: Set(None),
            claimed_by: Set(None),
            claimed_at: Set(None),
            run_after: Set(None),
            finished_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match job.insert(&self.db).await {
            Ok(model) => Ok(Some(model)),
            Err(DbErr::UnpackInsertId) => Ok(Some(self.require(id).await?)),
            Err(err) if is_unique_violation(&err) => {
                tracing::debug!(
                    tenant_id = %tenant_id,
                    content_id = %content_id,
                    "Enrichment job already queued; skipping enqueue"
                );
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Claim the oldest eligible pending job for `worker_id`.
    pub async fn claim(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Model>, ApiError> {
        let txn = self.db.begin().await?;

        let eligible = Condition::any()
            .add(Column::RunAfter.is_null())
            .add(Column::RunAfter.lte(now.fixed_offset()));

        let Some(job) = Entity::find()
            .filter(Column::Status.eq(STATUS_PENDING))
            .filter(eligible)
            .order_by_asc(Column::CreatedAt)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .one(&txn)
            .await?
        else {
            txn.rollback().await?;
            return Ok(None);
        };

        let id = job.id;
        let attempts = job.attempts + 1;
        let mut active: ActiveModel = job.into();
        active.status = Set(STATUS_PROCESSING.to_string());
        active.claimed_by = Set(Some(worker_id.to_string()));
        active.claimed_at = Set(Some(now.fixed_offset()));
        active.attempts = Set(attempts);
        active.updated_at = Set(now.fixed_offset());
        active.update(&txn).await?;

        txn.commit().await?;

        Ok(Some(self.require(id).await?))
    }

    /// Flip abandoned `processing` rows back to `pending`.
    pub async fn reclaim_stale(
        &self,
        max_processing_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<u64, ApiError> {
        let cutoff = now - Duration::seconds(max_processing_seconds as i64);

        // Guarded statement; a row that went terminal since the claim expired
        // no longer matches the status filter and is left alone.
        let result = Entity::update_many()
            .col_expr(Column::Status, Expr::value(STATUS_PENDING))
            .col_expr(Column::ClaimedBy, Expr::value(Option::<String>::None))
            .col_expr(
                Column::ClaimedAt,
                Expr::value(Option::<DateTime<FixedOffset>>::None),
            )
            .col_expr(Column::UpdatedAt, Expr::value(now.fixed_offset()))
            .filter(Column::Status.eq(STATUS_PROCESSING))
            .filter(Column::ClaimedAt.lt(cutoff.fixed_offset()))
            .exec(&self.db)
            .await?;

        if result.rows_affected > 0 {
            tracing::warn!(
                count = result.rows_affected,
                "Reclaimed stale enrichment job claims"
            );
        }

        Ok(result.rows_affected)
    }

    /// Mark a claimed job as successfully completed.
    pub async fn complete(&self, job: Model, now: DateTime<Utc>) -> Result<Model, ApiError> {
        let mut active: ActiveModel = job.into();
        active.status = Set(STATUS_COMPLETED.to_string());
        active.finished_at = Set(Some(now.fixed_offset()));
        active.updated_at = Set(now.fixed_offset());
        Ok(active.update(&self.db).await?)
    }

    /// Record a failed attempt. Backoff is measured in whole scheduling
    /// intervals (`interval * 2^(attempts-1)`); past the ceiling the job is
    /// terminally `failed` with the message preserved.
    pub async fn fail_or_reschedule(
        &self,
        job: Model,
        error_message: String,
        max_attempts: u32,
        poll_interval_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<Model, ApiError> {
        let attempts = job.attempts;
        let mut active: ActiveModel = job.into();
        active.error_message = Set(Some(error_message));
        active.updated_at = Set(now.fixed_offset());

        if (attempts as u32) < max_attempts {
            let exponent = (attempts.max(1) as u32 - 1).min(20);
            let backoff_seconds = poll_interval_seconds.saturating_mul(1u64 << exponent);
            active.status = Set(STATUS_PENDING.to_string());
            active.claimed_by = Set(None);
            active.claimed_at = Set(None);
            active.run_after = Set(Some(
                (now + Duration::seconds(backoff_seconds as i64)).fixed_offset(),
            ));
        } else {
            active.status = Set(STATUS_FAILED.to_string());
            active.finished_at = Set(Some(now.fixed_offset()));
        }

        Ok(active.update(&self.db).await?)
    }

    /// List jobs for a tenant with an optional status filter.
    pub async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        status: Option<&str>,
        limit: u64,
    ) -> Result<Vec<Model>, ApiError> {
        let mut query = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_desc(Column::CreatedAt)
            .limit(limit);

        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status));
        }

        Ok(query.all(&self.db).await?)
    }

    async fn require(&self, id: Uuid) -> Result<Model, ApiError> {
        Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ApiError::new(
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Enrichment job not persisted",
                )
            })
    }
}

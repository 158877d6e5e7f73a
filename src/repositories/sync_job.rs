//! # SyncJob Repository
//!
//! Queue operations for the sync_jobs table: enqueue, the atomic claim
//! protocol, stale-claim recovery, and terminal transitions.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::sync_job::{
    ActiveModel, Column, Entity, Model, KIND_BACKFILL, KIND_DAILY_SYNC, KIND_ON_DEMAND,
    PRIORITY_BACKFILL, PRIORITY_DAILY, PRIORITY_ON_DEMAND, STATUS_COMPLETED, STATUS_FAILED,
    STATUS_PENDING, STATUS_PROCESSING,
};

/// Default claim priority for each job kind.
pub fn priority_for_kind(kind: &str) -> i16 {
    match kind {
        KIND_BACKFILL => PRIORITY_BACKFILL,
        KIND_ON_DEMAND => PRIORITY_ON_DEMAND,
        KIND_DAILY_SYNC => PRIORITY_DAILY,
        _ => PRIORITY_DAILY,
    }
}

/// Repository for sync job database operations
#[derive(Clone)]
pub struct SyncJobRepository {
    db: DatabaseConnection,
}

impl SyncJobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enqueue a new sync job in `pending` state.
    pub async fn enqueue(
        &self,
        tenant_id: Uuid,
        platform: &str,
        kind: &str,
    ) -> Result<Model, ApiError> {
        let now = Utc::now().fixed_offset();
        let id = Uuid::new_v4();

        let job = ActiveModel {
            id: Set(id),
            tenant_id: Set(tenant_id),
            platform: Set(platform.to_string()),
            kind: Set(kind.to_string()),
            status: Set(STATUS_PENDING.to_string()),
            priority: Set(priority_for_kind(kind)),
            attempts: Set(0),
            claimed_by: Set(None),
            claimed_at: Set(None),
            run_after: Set(None),
            finished_at: Set(None),
            error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match job.insert(&self.db).await {
            Ok(model) => {
                tracing::info!(
                    tenant_id = %tenant_id,
                    platform = platform,
                    kind = kind,
                    job_id = %model.id,
                    "Sync job enqueued"
                );
                return Ok(model);
            }
            Err(DbErr::UnpackInsertId) => {}
            Err(err) => return Err(err.into()),
        }

        self.require(id).await
    }

    /// Claim the highest-priority eligible pending job for `worker_id`.
    ///
    /// Runs in a transaction with `FOR UPDATE SKIP LOCKED` so concurrent
    /// claimants each get a distinct row or nothing.
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
            .order_by_desc(Column::Priority)
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
    ///
    /// A claim older than `max_processing_seconds` means the worker died
    /// mid-job; the row becomes claimable again on the next poll.
    pub async fn reclaim_stale(
        &self,
        max_processing_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<u64, ApiError> {
        let cutoff = now - Duration::seconds(max_processing_seconds as i64);

        // Single guarded statement: the status filter is re-evaluated inside
        // the UPDATE, so a claimant that finishes just past the window cannot
        // have its terminal row flipped back to pending.
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
                "Reclaimed stale sync job claims"
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

    /// Record a failed attempt: reschedule with exponential backoff while
    /// attempts remain, otherwise mark the job terminally `failed`.
    pub async fn fail_or_reschedule(
        &self,
        job: Model,
        error: JsonValue,
        max_attempts: u32,
        backoff_base_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<Model, ApiError> {
        let attempts = job.attempts;
        let mut active: ActiveModel = job.into();
        active.error = Set(Some(error));
        active.updated_at = Set(now.fixed_offset());

        if (attempts as u32) < max_attempts {
            let exponent = (attempts.max(1) as u32 - 1).min(20);
            let backoff_seconds = backoff_base_seconds.saturating_mul(1u64 << exponent);
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

    /// List jobs for a tenant with optional platform/status filters.
    pub async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        platform: Option<&str>,
        status: Option<&str>,
        limit: u64,
    ) -> Result<Vec<Model>, ApiError> {
        let mut query = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_desc(Column::CreatedAt)
            .limit(limit);

        if let Some(platform) = platform {
            query = query.filter(Column::Platform.eq(platform));
        }
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
                    "Sync job not persisted",
                )
            })
    }
}

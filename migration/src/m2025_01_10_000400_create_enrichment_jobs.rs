//! Migration to create the enrichment_jobs table.
//!
//! The unique (tenant_id, content_id, content_type) index makes re-enqueuing
//! an already-queued item a no-op rather than a duplicate.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EnrichmentJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnrichmentJobs::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(EnrichmentJobs::TenantId).uuid().not_null())
                    .col(ColumnDef::new(EnrichmentJobs::ContentId).uuid().not_null())
                    .col(ColumnDef::new(EnrichmentJobs::ContentType).text().not_null())
                    .col(
                        ColumnDef::new(EnrichmentJobs::Status)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(EnrichmentJobs::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(EnrichmentJobs::ErrorMessage).text().null())
                    .col(ColumnDef::new(EnrichmentJobs::ClaimedBy).text().null())
                    .col(
                        ColumnDef::new(EnrichmentJobs::ClaimedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EnrichmentJobs::RunAfter)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EnrichmentJobs::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(EnrichmentJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EnrichmentJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_enrichment_jobs_tenant_id")
                            .from(EnrichmentJobs::Table, EnrichmentJobs::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enrichment_jobs_tenant_content")
                    .table(EnrichmentJobs::Table)
                    .col(EnrichmentJobs::TenantId)
                    .col(EnrichmentJobs::ContentId)
                    .col(EnrichmentJobs::ContentType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_enrichment_jobs_status_run_after")
                    .table(EnrichmentJobs::Table)
                    .col(EnrichmentJobs::Status)
                    .col(EnrichmentJobs::RunAfter)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_enrichment_jobs_tenant_content")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_enrichment_jobs_status_run_after")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(EnrichmentJobs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum EnrichmentJobs {
    Table,
    Id,
    TenantId,
    ContentId,
    ContentType,
    Status,
    Attempts,
    ErrorMessage,
    ClaimedBy,
    ClaimedAt,
    RunAfter,
    FinishedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

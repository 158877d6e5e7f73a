//! Migration to create the content_items table.
//!
//! Synced content pulled from platforms, deduplicated on the platform's own
//! identifier, with enrichment output written back in place.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ContentItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ContentItems::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ContentItems::TenantId).uuid().not_null())
                    .col(ColumnDef::new(ContentItems::Platform).text().not_null())
                    .col(ColumnDef::new(ContentItems::ExternalId).text().not_null())
                    .col(ColumnDef::new(ContentItems::Kind).text().not_null())
                    .col(ColumnDef::new(ContentItems::Payload).json_binary().not_null())
                    .col(ColumnDef::new(ContentItems::Transcript).text().null())
                    .col(ColumnDef::new(ContentItems::Embedding).json_binary().null())
                    .col(
                        ColumnDef::new(ContentItems::EnrichedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ContentItems::SyncedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ContentItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ContentItems::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_content_items_tenant_id")
                            .from(ContentItems::Table, ContentItems::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_content_items_tenant_platform_external")
                    .table(ContentItems::Table)
                    .col(ContentItems::TenantId)
                    .col(ContentItems::Platform)
                    .col(ContentItems::ExternalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_content_items_tenant_platform_external")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ContentItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ContentItems {
    Table,
    Id,
    TenantId,
    Platform,
    ExternalId,
    Kind,
    Payload,
    Transcript,
    Embedding,
    EnrichedAt,
    SyncedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

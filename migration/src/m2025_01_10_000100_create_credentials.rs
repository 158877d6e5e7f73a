//! Migration to create the credentials table.
//!
//! One live record per (tenant_id, platform); token material is stored as
//! ciphertext produced by the vault.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Credentials::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Credentials::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Credentials::TenantId).uuid().not_null())
                    .col(ColumnDef::new(Credentials::Platform).text().not_null())
                    .col(
                        ColumnDef::new(Credentials::AccessSecretCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Credentials::RefreshSecretCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Credentials::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Credentials::Scopes).json_binary().null())
                    .col(ColumnDef::new(Credentials::Metadata).json_binary().null())
                    .col(
                        ColumnDef::new(Credentials::LastRefreshedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Credentials::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Credentials::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_credentials_tenant_id")
                            .from(Credentials::Table, Credentials::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Exactly one live record per (tenant, platform)
        manager
            .create_index(
                Index::create()
                    .name("idx_credentials_tenant_platform")
                    .table(Credentials::Table)
                    .col(Credentials::TenantId)
                    .col(Credentials::Platform)
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
                    .name("idx_credentials_tenant_platform")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Credentials::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Credentials {
    Table,
    Id,
    TenantId,
    Platform,
    AccessSecretCiphertext,
    RefreshSecretCiphertext,
    ExpiresAt,
    Scopes,
    Metadata,
    LastRefreshedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tenants {
    Table,
    Id,
}

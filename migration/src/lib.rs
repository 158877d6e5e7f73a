//! Database migrations for the credential broker.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2025_01_10_000001_create_tenants;
mod m2025_01_10_000100_create_credentials;
mod m2025_01_10_000200_create_content_items;
mod m2025_01_10_000300_create_sync_jobs;
mod m2025_01_10_000400_create_enrichment_jobs;
mod m2025_01_10_000500_create_audit_events;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_01_10_000001_create_tenants::Migration),
            Box::new(m2025_01_10_000100_create_credentials::Migration),
            Box::new(m2025_01_10_000200_create_content_items::Migration),
            Box::new(m2025_01_10_000300_create_sync_jobs::Migration),
            Box::new(m2025_01_10_000400_create_enrichment_jobs::Migration),
            Box::new(m2025_01_10_000500_create_audit_events::Migration),
        ]
    }
}

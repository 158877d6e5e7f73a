//! # Data Models
//!
//! SeaORM entities for the credential broker.

pub mod audit_event;
pub mod content_item;
pub mod credential;
pub mod enrichment_job;
pub mod sync_job;
pub mod tenant;

pub use audit_event::Entity as AuditEvent;
pub use content_item::Entity as ContentItem;
pub use credential::Entity as Credential;
pub use enrichment_job::Entity as EnrichmentJob;
pub use sync_job::Entity as SyncJob;
pub use tenant::Entity as Tenant;

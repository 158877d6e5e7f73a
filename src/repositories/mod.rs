//! Repository layer encapsulating SeaORM operations per table.

pub mod audit;
pub mod content;
pub mod credential;
pub mod enrichment_job;
pub mod sync_job;
pub mod tenant;

pub use audit::AuditRepository;
pub use content::ContentRepository;
pub use credential::{CredentialRepository, DecryptedCredential};
pub use enrichment_job::EnrichmentJobRepository;
pub use sync_job::SyncJobRepository;
pub use tenant::TenantRepository;

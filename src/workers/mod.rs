//! Background workers: sync pulls and enrichment derivation.

pub mod enrichment;
pub mod sync;

pub use enrichment::{Enricher, Enrichment, EnrichmentWorker, EnrichmentError, TextEnricher};
pub use sync::SyncWorker;

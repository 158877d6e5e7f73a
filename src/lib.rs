//! # Credential Broker Library
//!
//! Multi-tenant OAuth credential broker and sync orchestrator: platform
//! handlers exchange and refresh tokens, the vault encrypts them at rest,
//! the router delivers them to tenant endpoints, and background workers run
//! content sync and enrichment jobs against the stored credentials.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod platforms;
pub mod repositories;
pub mod router;
pub mod server;
pub mod telemetry;
pub mod vault;
pub mod workers;
pub use migration;

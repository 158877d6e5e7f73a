//! Platform handler implementations
//!
//! One adapter per external platform plus the registry that holds the closed
//! set of enabled handlers.

pub mod asana;
pub mod example;
pub mod google;
pub mod handler;
pub mod meta;
pub mod registry;

pub use handler::{ContentDraft, CredentialBundle, ExchangeError, FetchError, PlatformHandler};
pub use registry::{Registry, RegistryError};

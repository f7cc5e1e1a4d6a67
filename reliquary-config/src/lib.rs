//! Configuration for Reliquary deployments.
//!
//! Resolves a [`ReliquaryConfig`] from files, inline JSON and defaults,
//! checks it against guard rails, and installs the tracing subscriber the
//! rest of the workspace logs through.
#![allow(missing_docs)]

pub mod loader;
pub mod logging;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, ConfigSource, EnvConfig};
pub use logging::init_tracing;
pub use models::{ImportConfig, LoggingConfig, ReliquaryConfig};
pub use validation::ConfigGuardRailError;

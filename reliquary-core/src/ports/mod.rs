//! Interfaces to everything outside the core.
//!
//! Each port is an `async_trait` consumed as `Arc<dyn Port>`. Adapters live
//! under [`crate::infra`].

pub mod blobs;
pub mod characterization;
pub mod derivatives;
pub mod identifiers;
pub mod imports;
pub mod jobs;
pub mod repository;
pub mod staging;
pub mod virus;

pub use blobs::{BlobStore, StoredBlob, sha256_hex};
pub use characterization::Characterizer;
pub use derivatives::DerivativeGenerator;
pub use identifiers::{IdentifierAuthority, IdentifierMetadata};
pub use imports::ImportLedger;
pub use jobs::JobQueue;
pub use repository::RepositoryStore;
pub use staging::StagingArea;
pub use virus::{ScanVerdict, VirusScanner};

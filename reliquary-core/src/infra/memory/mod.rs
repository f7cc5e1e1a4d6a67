//! In-memory adapters for every port.
//!
//! They back the test suites and make the core runnable without external
//! services.

mod blobs;
mod derivatives;
mod identifiers;
mod imports;
mod jobs;
mod repository;
mod staging;

use std::sync::Arc;

pub use blobs::InMemoryBlobStore;
pub use derivatives::SyntheticDerivativeGenerator;
pub use identifiers::InMemoryIdentifierAuthority;
pub use imports::InMemoryImportLedger;
pub use jobs::InMemoryJobQueue;
pub use repository::InMemoryRepositoryStore;
pub use staging::InMemoryStagingArea;

use crate::collaborators::Collaborators;
use crate::infra::{BasicCharacterizer, SignatureScanner};

/// A full set of in-memory collaborators, keeping the concrete handles so
/// callers can inspect and steer them.
#[derive(Debug, Clone)]
pub struct InMemoryStack {
    pub repository: Arc<InMemoryRepositoryStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub backups: Arc<InMemoryBlobStore>,
    pub identifiers: Arc<InMemoryIdentifierAuthority>,
    pub derivatives: Arc<SyntheticDerivativeGenerator>,
    pub scanner: Arc<SignatureScanner>,
    pub jobs: Arc<InMemoryJobQueue>,
    pub staging: Arc<InMemoryStagingArea>,
    pub imports: Arc<InMemoryImportLedger>,
}

impl Default for InMemoryStack {
    fn default() -> Self {
        Self {
            repository: Arc::new(InMemoryRepositoryStore::new()),
            blobs: Arc::new(InMemoryBlobStore::new("preservation")),
            backups: Arc::new(InMemoryBlobStore::new("backup")),
            identifiers: Arc::new(InMemoryIdentifierAuthority::default()),
            derivatives: Arc::new(SyntheticDerivativeGenerator::default()),
            scanner: Arc::new(SignatureScanner::default()),
            jobs: Arc::new(InMemoryJobQueue::new()),
            staging: Arc::new(InMemoryStagingArea::new()),
            imports: Arc::new(InMemoryImportLedger::new()),
        }
    }
}

impl InMemoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_derivatives(mut self, generator: SyntheticDerivativeGenerator) -> Self {
        self.derivatives = Arc::new(generator);
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            repository: self.repository.clone(),
            blobs: self.blobs.clone(),
            backups: self.backups.clone(),
            identifiers: self.identifiers.clone(),
            derivatives: self.derivatives.clone(),
            characterizer: Arc::new(BasicCharacterizer),
            scanner: self.scanner.clone(),
            jobs: self.jobs.clone(),
            staging: self.staging.clone(),
            imports: self.imports.clone(),
        }
    }
}

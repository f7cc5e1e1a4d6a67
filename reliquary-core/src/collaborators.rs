use std::any::type_name_of_val;
use std::fmt;
use std::sync::Arc;

use crate::ports::{
    BlobStore, Characterizer, DerivativeGenerator, IdentifierAuthority, ImportLedger, JobQueue,
    RepositoryStore, StagingArea, VirusScanner,
};

/// Every external collaborator the core talks to.
///
/// Transactions and services receive this bundle at construction; nothing
/// in the core reaches for a global.
#[derive(Clone)]
pub struct Collaborators {
    pub repository: Arc<dyn RepositoryStore>,
    /// Preservation files and derivatives.
    pub blobs: Arc<dyn BlobStore>,
    /// Backup copies, independent of `blobs`.
    pub backups: Arc<dyn BlobStore>,
    pub identifiers: Arc<dyn IdentifierAuthority>,
    pub derivatives: Arc<dyn DerivativeGenerator>,
    pub characterizer: Arc<dyn Characterizer>,
    pub scanner: Arc<dyn VirusScanner>,
    pub jobs: Arc<dyn JobQueue>,
    pub staging: Arc<dyn StagingArea>,
    pub imports: Arc<dyn ImportLedger>,
}

impl Collaborators {
    pub fn builder() -> CollaboratorsBuilder {
        CollaboratorsBuilder::default()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("repository", &type_name_of_val(self.repository.as_ref()))
            .field("blobs", &type_name_of_val(self.blobs.as_ref()))
            .field("backups", &type_name_of_val(self.backups.as_ref()))
            .field("identifiers", &type_name_of_val(self.identifiers.as_ref()))
            .field("derivatives", &type_name_of_val(self.derivatives.as_ref()))
            .field(
                "characterizer",
                &type_name_of_val(self.characterizer.as_ref()),
            )
            .field("scanner", &type_name_of_val(self.scanner.as_ref()))
            .field("jobs", &type_name_of_val(self.jobs.as_ref()))
            .field("staging", &type_name_of_val(self.staging.as_ref()))
            .field("imports", &type_name_of_val(self.imports.as_ref()))
            .finish()
    }
}

#[derive(Default)]
pub struct CollaboratorsBuilder {
    repository: Option<Arc<dyn RepositoryStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    backups: Option<Arc<dyn BlobStore>>,
    identifiers: Option<Arc<dyn IdentifierAuthority>>,
    derivatives: Option<Arc<dyn DerivativeGenerator>>,
    characterizer: Option<Arc<dyn Characterizer>>,
    scanner: Option<Arc<dyn VirusScanner>>,
    jobs: Option<Arc<dyn JobQueue>>,
    staging: Option<Arc<dyn StagingArea>>,
    imports: Option<Arc<dyn ImportLedger>>,
}

impl fmt::Debug for CollaboratorsBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollaboratorsBuilder")
            .field("repository", &self.repository.is_some())
            .field("blobs", &self.blobs.is_some())
            .field("backups", &self.backups.is_some())
            .field("identifiers", &self.identifiers.is_some())
            .field("derivatives", &self.derivatives.is_some())
            .field("characterizer", &self.characterizer.is_some())
            .field("scanner", &self.scanner.is_some())
            .field("jobs", &self.jobs.is_some())
            .field("staging", &self.staging.is_some())
            .field("imports", &self.imports.is_some())
            .finish()
    }
}

impl CollaboratorsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repository(mut self, repo: Arc<dyn RepositoryStore>) -> Self {
        self.repository = Some(repo);
        self
    }
    pub fn with_blobs(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(store);
        self
    }
    pub fn with_backups(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.backups = Some(store);
        self
    }
    pub fn with_identifiers(
        mut self,
        authority: Arc<dyn IdentifierAuthority>,
    ) -> Self {
        self.identifiers = Some(authority);
        self
    }
    pub fn with_derivatives(
        mut self,
        generator: Arc<dyn DerivativeGenerator>,
    ) -> Self {
        self.derivatives = Some(generator);
        self
    }
    pub fn with_characterizer(
        mut self,
        characterizer: Arc<dyn Characterizer>,
    ) -> Self {
        self.characterizer = Some(characterizer);
        self
    }
    pub fn with_scanner(mut self, scanner: Arc<dyn VirusScanner>) -> Self {
        self.scanner = Some(scanner);
        self
    }
    pub fn with_jobs(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.jobs = Some(queue);
        self
    }
    pub fn with_staging(mut self, staging: Arc<dyn StagingArea>) -> Self {
        self.staging = Some(staging);
        self
    }
    pub fn with_imports(mut self, ledger: Arc<dyn ImportLedger>) -> Self {
        self.imports = Some(ledger);
        self
    }

    /// Returns a string error naming the first missing collaborator.
    pub fn build(self) -> Result<Collaborators, String> {
        Ok(Collaborators {
            repository: self
                .repository
                .ok_or_else(|| "missing RepositoryStore".to_string())?,
            blobs: self
                .blobs
                .ok_or_else(|| "missing BlobStore".to_string())?,
            backups: self
                .backups
                .ok_or_else(|| "missing backup BlobStore".to_string())?,
            identifiers: self
                .identifiers
                .ok_or_else(|| "missing IdentifierAuthority".to_string())?,
            derivatives: self
                .derivatives
                .ok_or_else(|| "missing DerivativeGenerator".to_string())?,
            characterizer: self
                .characterizer
                .ok_or_else(|| "missing Characterizer".to_string())?,
            scanner: self
                .scanner
                .ok_or_else(|| "missing VirusScanner".to_string())?,
            jobs: self.jobs.ok_or_else(|| "missing JobQueue".to_string())?,
            staging: self
                .staging
                .ok_or_else(|| "missing StagingArea".to_string())?,
            imports: self
                .imports
                .ok_or_else(|| "missing ImportLedger".to_string())?,
        })
    }
}

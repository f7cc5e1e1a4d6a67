//! Error types for the core.
//!
//! [`CoreError`] is what collaborators report. [`Failure`] is what a
//! transaction reports: a stable [`FailureCode`], human readable details and,
//! where it helps a caller, the change set that could not be persisted.

use std::fmt;
use std::sync::Arc;

use reliquary_model::{FieldError, LockToken, ResourceId, ResourceKind, ResourceRecord};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("stale lock on {id}: expected {expected:?}, found {found:?}")]
    StaleLock {
        id: ResourceId,
        expected: Option<LockToken>,
        found: Option<LockToken>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        CoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }

    /// Transient conditions worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::StaleLock { .. } | CoreError::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Coarse grouping of failure codes, used by callers deciding what to do
/// next (fix input, retry, page an operator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    Input,
    Conflict,
    Integrity,
    ExternalDependency,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCode {
    ResourceNotFound,
    ValidationFailed,
    MissingUpdatedBy,
    MissingMimeType,
    MissingPreservationFile,
    FileBackupAlreadyPresent,
    ThumbnailDeletionRefused,
    VirusDetected,
    InvalidImport,
    ImportNotCancellable,
    ErrorSavingResource,
    MultipleParentItemsFound,
    ErrorLoadingResource,
    ErrorUploadingFile,
    ErrorReadingFile,
    ErrorDeletingFile,
    ErrorScanningFile,
    ErrorCharacterizingFile,
    ErrorGeneratingDerivatives,
    ErrorDeletingResource,
    ErrorMintingIdentifier,
    ErrorResolvingIdentifier,
    ImportFailed,
    InternalError,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::ResourceNotFound => "resource_not_found",
            FailureCode::ValidationFailed => "validation_failed",
            FailureCode::MissingUpdatedBy => "missing_updated_by",
            FailureCode::MissingMimeType => "missing_mime_type",
            FailureCode::MissingPreservationFile => "missing_preservation_file",
            FailureCode::FileBackupAlreadyPresent => "file_backup_already_present",
            FailureCode::ThumbnailDeletionRefused => "thumbnail_deletion_refused",
            FailureCode::VirusDetected => "virus_detected",
            FailureCode::InvalidImport => "invalid_import",
            FailureCode::ImportNotCancellable => "import_not_cancellable",
            FailureCode::ErrorSavingResource => "error_saving_resource",
            FailureCode::MultipleParentItemsFound => "multiple_parent_items_found",
            FailureCode::ErrorLoadingResource => "error_loading_resource",
            FailureCode::ErrorUploadingFile => "error_uploading_file",
            FailureCode::ErrorReadingFile => "error_reading_file",
            FailureCode::ErrorDeletingFile => "error_deleting_file",
            FailureCode::ErrorScanningFile => "error_scanning_file",
            FailureCode::ErrorCharacterizingFile => "error_characterizing_file",
            FailureCode::ErrorGeneratingDerivatives => "error_generating_derivatives",
            FailureCode::ErrorDeletingResource => "error_deleting_resource",
            FailureCode::ErrorMintingIdentifier => "error_minting_identifier",
            FailureCode::ErrorResolvingIdentifier => "error_resolving_identifier",
            FailureCode::ImportFailed => "import_failed",
            FailureCode::InternalError => "internal_error",
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            FailureCode::ResourceNotFound
            | FailureCode::ValidationFailed
            | FailureCode::MissingUpdatedBy
            | FailureCode::MissingMimeType
            | FailureCode::MissingPreservationFile
            | FailureCode::VirusDetected
            | FailureCode::InvalidImport => FailureClass::Input,
            FailureCode::FileBackupAlreadyPresent
            | FailureCode::ThumbnailDeletionRefused
            | FailureCode::ImportNotCancellable
            | FailureCode::ErrorSavingResource => FailureClass::Conflict,
            FailureCode::MultipleParentItemsFound => FailureClass::Integrity,
            FailureCode::ErrorLoadingResource
            | FailureCode::ErrorUploadingFile
            | FailureCode::ErrorReadingFile
            | FailureCode::ErrorDeletingFile
            | FailureCode::ErrorScanningFile
            | FailureCode::ErrorCharacterizingFile
            | FailureCode::ErrorGeneratingDerivatives
            | FailureCode::ErrorDeletingResource
            | FailureCode::ErrorMintingIdentifier
            | FailureCode::ErrorResolvingIdentifier => FailureClass::ExternalDependency,
            FailureCode::ImportFailed | FailureCode::InternalError => FailureClass::Internal,
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a failed transaction.
///
/// Failures are values. Steps return them instead of panicking, and the
/// transaction engine stops at the first one.
#[derive(Debug, Clone)]
pub struct Failure {
    pub code: FailureCode,
    pub details: Vec<String>,
    pub field_errors: Vec<FieldError>,
    pub source: Option<Arc<CoreError>>,
    /// The proposed resource as it stood when the failure happened.
    pub change_set: Option<Box<ResourceRecord>>,
}

impl Failure {
    pub fn new(code: FailureCode) -> Self {
        Self {
            code,
            details: Vec::new(),
            field_errors: Vec::new(),
            source: None,
            change_set: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn with_source(mut self, source: CoreError) -> Self {
        self.details.push(source.to_string());
        self.source = Some(Arc::new(source));
        self
    }

    pub fn with_change_set(mut self, record: ResourceRecord) -> Self {
        self.change_set = Some(Box::new(record));
        self
    }

    pub fn not_found(kind: ResourceKind, id: impl fmt::Display) -> Self {
        Failure::new(FailureCode::ResourceNotFound).with_detail(format!("{kind} {id} not found"))
    }

    pub fn validation(errors: Vec<FieldError>, record: ResourceRecord) -> Self {
        let mut failure = Failure::new(FailureCode::ValidationFailed).with_change_set(record);
        failure.details = errors.iter().map(ToString::to_string).collect();
        failure.field_errors = errors;
        failure
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Failure::new(FailureCode::InternalError).with_detail(detail)
    }

    /// Wrap a collaborator error under `code`.
    pub fn from_core(code: FailureCode, error: CoreError) -> Self {
        Failure::new(code).with_source(error)
    }

    pub fn class(&self) -> FailureClass {
        self.code.class()
    }

    /// True only for stale-lock conflicts and collaborator unavailability.
    pub fn is_retryable(&self) -> bool {
        self.source.as_deref().is_some_and(CoreError::is_transient)
    }

    pub fn message(&self) -> String {
        if self.details.is_empty() {
            self.code.to_string()
        } else {
            format!("{}: {}", self.code, self.details.join("; "))
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

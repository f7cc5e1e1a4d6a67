//! Bulk import: structural validation, all-or-nothing asset creation with
//! compensation, and the ledger-backed job lifecycle.

mod compensation;
pub mod record;
pub mod service;
pub mod validation;

pub use record::{BulkImportRecord, BulkImportState};
pub use service::{BulkImportService, ImportFailure, ImportSummary};
pub use validation::ValidatedImport;

use async_trait::async_trait;
use reliquary_model::ImportId;

use crate::error::Result;
use crate::import::BulkImportRecord;

/// Persistence for bulk import records.
#[async_trait]
pub trait ImportLedger: Send + Sync {
    async fn find(&self, id: ImportId) -> Result<Option<BulkImportRecord>>;

    /// Insert or replace.
    async fn save(&self, record: BulkImportRecord) -> Result<()>;
}

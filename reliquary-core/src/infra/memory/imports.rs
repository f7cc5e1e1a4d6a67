use std::collections::HashMap;

use async_trait::async_trait;
use reliquary_model::ImportId;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::import::BulkImportRecord;
use crate::ports::ImportLedger;

#[derive(Debug, Default)]
pub struct InMemoryImportLedger {
    records: RwLock<HashMap<ImportId, BulkImportRecord>>,
}

impl InMemoryImportLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImportLedger for InMemoryImportLedger {
    async fn find(&self, id: ImportId) -> Result<Option<BulkImportRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn save(&self, record: BulkImportRecord) -> Result<()> {
        self.records.write().await.insert(record.id, record);
        Ok(())
    }
}

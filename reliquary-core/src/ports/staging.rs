use async_trait::async_trait;

use crate::error::Result;

/// Where bulk import files wait before ingestion.
///
/// `location` is the storage name declared by an import description.
#[async_trait]
pub trait StagingArea: Send + Sync {
    async fn exists(&self, location: &str, filename: &str) -> Result<bool>;

    async fn read(&self, location: &str, filename: &str) -> Result<Vec<u8>>;
}

use async_trait::async_trait;
use reliquary_model::TechnicalMetadata;

use crate::error::Result;

/// Extracts technical metadata from file content.
///
/// Implementations fill whatever they can determine; the sha256 field is
/// always overwritten by the core.
#[async_trait]
pub trait Characterizer: Send + Sync {
    async fn characterize(&self, content: &[u8], filename: &str) -> Result<TechnicalMetadata>;
}

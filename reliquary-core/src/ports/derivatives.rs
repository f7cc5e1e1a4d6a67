use std::path::Path;

use async_trait::async_trait;
use reliquary_model::DerivativeType;

use crate::error::Result;

#[async_trait]
pub trait DerivativeGenerator: Send + Sync {
    /// Produce one derivative of the file at `source`.
    ///
    /// `Ok(None)` means the generator declines this type for this input
    /// (e.g. no text layer); the type is then omitted.
    async fn generate(
        &self,
        source: &Path,
        mime_type: &str,
        kind: DerivativeType,
    ) -> Result<Option<Vec<u8>>>;
}

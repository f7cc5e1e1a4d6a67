use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use reliquary_model::DerivativeType;

use crate::error::{CoreError, Result};
use crate::ports::{DerivativeGenerator, sha256_hex};

/// Generator producing small deterministic payloads derived from the
/// source bytes. Useful wherever real image tooling is not installed.
#[derive(Debug, Clone)]
pub struct SyntheticDerivativeGenerator {
    declined: HashSet<DerivativeType>,
    failing: HashSet<DerivativeType>,
}

impl Default for SyntheticDerivativeGenerator {
    /// Declines the OCR-based types.
    fn default() -> Self {
        Self {
            declined: [
                DerivativeType::TextonlyPdf,
                DerivativeType::Text,
                DerivativeType::Hocr,
            ]
            .into_iter()
            .collect(),
            failing: HashSet::new(),
        }
    }
}

impl SyntheticDerivativeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declining(mut self, kind: DerivativeType) -> Self {
        self.declined.insert(kind);
        self
    }

    pub fn accepting(mut self, kind: DerivativeType) -> Self {
        self.declined.remove(&kind);
        self
    }

    pub fn failing(mut self, kind: DerivativeType) -> Self {
        self.failing.insert(kind);
        self
    }
}

#[async_trait]
impl DerivativeGenerator for SyntheticDerivativeGenerator {
    async fn generate(
        &self,
        source: &Path,
        mime_type: &str,
        kind: DerivativeType,
    ) -> Result<Option<Vec<u8>>> {
        if self.failing.contains(&kind) {
            return Err(CoreError::Unavailable(format!("{kind} generator unavailable")));
        }
        if self.declined.contains(&kind) {
            return Ok(None);
        }
        let content = tokio::fs::read(source).await?;
        let payload = format!(
            "{kind} ({}) of {mime_type} {}",
            kind.output_mime(mime_type),
            sha256_hex(&content)
        );
        Ok(Some(payload.into_bytes()))
    }
}

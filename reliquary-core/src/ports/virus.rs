use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    Infected { signature: String },
}

#[async_trait]
pub trait VirusScanner: Send + Sync {
    async fn scan(&self, content: &[u8]) -> Result<ScanVerdict>;
}

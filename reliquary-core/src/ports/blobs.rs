use async_trait::async_trait;
use reliquary_model::{BlobId, ResourceId};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub id: BlobId,
    /// Hex sha256 of the stored bytes as computed by the store.
    pub checksum: String,
}

/// Content storage. The core uses one store for preservation files and
/// derivatives, and a second, independent store for backup copies.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `label` distinguishes blobs an owner keeps side by side (the
    /// preservation file, each derivative type).
    async fn upload(&self, content: &[u8], owner: ResourceId, label: &str) -> Result<StoredBlob>;

    async fn read(&self, id: &BlobId) -> Result<Vec<u8>>;

    /// Deleting an absent blob succeeds.
    async fn delete(&self, id: &BlobId) -> Result<()>;
}

pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use reliquary_model::{BlobId, ResourceId};
use tokio::sync::Mutex;

use crate::error::{CoreError, Result};
use crate::ports::{BlobStore, StoredBlob, sha256_hex};

/// Content-addressed blob store held in memory.
///
/// Ids have the shape `{scheme}://{owner}/{label}/{sha256}`, so uploading
/// identical bytes for the same owner and label yields the same id.
#[derive(Debug)]
pub struct InMemoryBlobStore {
    scheme: &'static str,
    blobs: Mutex<HashMap<BlobId, Vec<u8>>>,
    uploads: AtomicUsize,
    offline: AtomicBool,
}

impl InMemoryBlobStore {
    pub fn new(scheme: &'static str) -> Self {
        Self {
            scheme,
            blobs: Mutex::new(HashMap::new()),
            uploads: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }

    pub async fn contains(&self, id: &BlobId) -> bool {
        self.blobs.lock().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn ids(&self) -> Vec<BlobId> {
        let mut ids: Vec<BlobId> = self.blobs.lock().await.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Number of upload calls that reached the store.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// While offline every call fails with [`CoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::Unavailable(format!("{} store offline", self.scheme)));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, content: &[u8], owner: ResourceId, label: &str) -> Result<StoredBlob> {
        self.ensure_online()?;
        let checksum = sha256_hex(content);
        let id = BlobId::new(format!("{}://{owner}/{label}/{checksum}", self.scheme));
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.blobs.lock().await.insert(id.clone(), content.to_vec());
        Ok(StoredBlob { id, checksum })
    }

    async fn read(&self, id: &BlobId) -> Result<Vec<u8>> {
        self.ensure_online()?;
        self.blobs
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("blob", id))
    }

    async fn delete(&self, id: &BlobId) -> Result<()> {
        self.ensure_online()?;
        self.blobs.lock().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_content_shares_an_id() {
        let store = InMemoryBlobStore::new("preservation");
        let owner = ResourceId::new();
        let a = store.upload(b"front", owner, "preservation").await.unwrap();
        let b = store.upload(b"front", owner, "preservation").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.upload_count(), 2);

        store.delete(&a.id).await.unwrap();
        store.delete(&a.id).await.unwrap();
        assert!(store.read(&a.id).await.unwrap_err().is_not_found());
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{CoreError, Result};
use crate::ports::{IdentifierAuthority, IdentifierMetadata};

/// Identifier authority that mints sequential ARKs under a shoulder.
#[derive(Debug)]
pub struct InMemoryIdentifierAuthority {
    shoulder: String,
    next: AtomicU64,
    minted: Mutex<BTreeMap<String, Option<IdentifierMetadata>>>,
}

impl Default for InMemoryIdentifierAuthority {
    fn default() -> Self {
        Self::new("99999/fk4")
    }
}

impl InMemoryIdentifierAuthority {
    pub fn new(shoulder: impl Into<String>) -> Self {
        Self {
            shoulder: shoulder.into(),
            next: AtomicU64::new(1),
            minted: Mutex::new(BTreeMap::new()),
        }
    }

    /// Record an identifier minted elsewhere.
    pub async fn register(&self, identifier: impl Into<String>) {
        self.minted.lock().await.insert(identifier.into(), None);
    }

    pub async fn metadata(&self, identifier: &str) -> Option<IdentifierMetadata> {
        self.minted.lock().await.get(identifier).cloned().flatten()
    }
}

#[async_trait]
impl IdentifierAuthority for InMemoryIdentifierAuthority {
    async fn mint(&self) -> Result<String> {
        let sequence = self.next.fetch_add(1, Ordering::SeqCst);
        let identifier = format!("ark:/{}{sequence:06}", self.shoulder);
        self.minted.lock().await.insert(identifier.clone(), None);
        Ok(identifier)
    }

    async fn exists(&self, identifier: &str) -> Result<bool> {
        Ok(self.minted.lock().await.contains_key(identifier))
    }

    async fn update_metadata(&self, identifier: &str, metadata: &IdentifierMetadata) -> Result<()> {
        let mut minted = self.minted.lock().await;
        let entry = minted
            .get_mut(identifier)
            .ok_or_else(|| CoreError::not_found("identifier", identifier))?;
        *entry = Some(metadata.clone());
        Ok(())
    }
}

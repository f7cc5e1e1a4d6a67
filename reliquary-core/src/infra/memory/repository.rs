use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reliquary_model::{Item, LockToken, ResourceId, ResourceRecord};
use tokio::sync::RwLock;

use crate::error::{CoreError, Result};
use crate::ports::RepositoryStore;

/// Repository store backed by a map. Queries scan every record, so they are
/// always consistent with `save`.
#[derive(Debug, Default)]
pub struct InMemoryRepositoryStore {
    records: RwLock<HashMap<ResourceId, ResourceRecord>>,
    offline: AtomicBool,
}

impl InMemoryRepositoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record without lock checks. Used to arrange states the
    /// transactions themselves would refuse to produce.
    pub async fn seed(&self, mut record: ResourceRecord) {
        if record.lock_token().is_none() {
            record.set_lock_token(LockToken::INITIAL);
        }
        self.records.write().await.insert(record.id(), record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, id: ResourceId) -> bool {
        self.records.read().await.contains_key(&id)
    }

    /// While offline every call fails with [`CoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(CoreError::Unavailable("repository store offline".into()));
        }
        Ok(())
    }

    async fn items(&self) -> Vec<Item> {
        self.records
            .read()
            .await
            .values()
            .filter_map(|record| record.as_item().cloned())
            .collect()
    }
}

#[async_trait]
impl RepositoryStore for InMemoryRepositoryStore {
    async fn find(&self, id: ResourceId) -> Result<Option<ResourceRecord>> {
        self.ensure_online()?;
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[ResourceId]) -> Result<Vec<ResourceRecord>> {
        self.ensure_online()?;
        let records = self.records.read().await;
        Ok(ids.iter().filter_map(|id| records.get(id).cloned()).collect())
    }

    async fn save(
        &self,
        mut record: ResourceRecord,
        expected: Option<LockToken>,
    ) -> Result<ResourceRecord> {
        self.ensure_online()?;
        let id = record.id();
        let mut records = self.records.write().await;
        let current = records.get(&id);
        let found = current.and_then(ResourceRecord::lock_token);

        let matches = match (current, expected) {
            (None, None) => true,
            (Some(_), Some(expected)) => found == Some(expected),
            _ => false,
        };
        if !matches {
            return Err(CoreError::StaleLock {
                id,
                expected,
                found,
            });
        }
        if let Some(current) = current
            && current.kind() != record.kind()
        {
            return Err(CoreError::Conflict(format!(
                "{id} is a {}, not a {}",
                current.kind(),
                record.kind()
            )));
        }

        let next = found.map_or(LockToken::INITIAL, LockToken::next);
        record.set_lock_token(next);
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn delete(&self, id: ResourceId) -> Result<()> {
        self.ensure_online()?;
        self.records.write().await.remove(&id);
        Ok(())
    }

    async fn find_items_by_unique_identifier(&self, identifier: &str) -> Result<Vec<Item>> {
        self.ensure_online()?;
        Ok(self
            .items()
            .await
            .into_iter()
            .filter(|item| item.unique_identifier.as_deref() == Some(identifier))
            .collect())
    }

    async fn find_items_referencing(&self, asset_id: ResourceId) -> Result<Vec<Item>> {
        self.ensure_online()?;
        Ok(self
            .items()
            .await
            .into_iter()
            .filter(|item| item.references(asset_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliquary_model::{Asset, Resource};

    #[tokio::test]
    async fn save_enforces_lock_tokens() {
        let store = InMemoryRepositoryStore::new();
        let asset = Asset::blank(ResourceId::new());

        let first = store.save(asset.clone().into_record(), None).await.unwrap();
        assert_eq!(first.lock_token(), Some(LockToken::INITIAL));

        let err = store.save(asset.clone().into_record(), None).await.unwrap_err();
        assert!(matches!(err, CoreError::StaleLock { .. }));

        let second = store
            .save(first.clone(), Some(LockToken::INITIAL))
            .await
            .unwrap();
        assert_eq!(second.lock_token(), Some(LockToken(2)));

        let stale = store.save(first, Some(LockToken::INITIAL)).await.unwrap_err();
        assert!(matches!(
            stale,
            CoreError::StaleLock {
                found: Some(LockToken(2)),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = InMemoryRepositoryStore::new();
        store.set_offline(true);
        let err = store.find(ResourceId::new()).await.unwrap_err();
        assert!(err.is_transient());
    }
}

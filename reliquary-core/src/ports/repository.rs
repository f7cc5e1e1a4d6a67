use async_trait::async_trait;
use reliquary_model::{Item, LockToken, ResourceId, ResourceRecord};

use crate::error::Result;

/// Durable storage for items and assets with optimistic locking.
///
/// Query methods (`find_items_*`) may be served from a search index that
/// lags behind `save`; callers must not rely on read-your-writes there.
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    async fn find(&self, id: ResourceId) -> Result<Option<ResourceRecord>>;

    /// Records for every id that exists, in the order given.
    async fn find_many(&self, ids: &[ResourceId]) -> Result<Vec<ResourceRecord>>;

    /// Persist `record`.
    ///
    /// `expected` is the lock token the caller read: `None` means the record
    /// must not exist yet. A mismatch is [`crate::CoreError::StaleLock`].
    /// Returns the record carrying its new lock token.
    async fn save(
        &self,
        record: ResourceRecord,
        expected: Option<LockToken>,
    ) -> Result<ResourceRecord>;

    /// Removing an absent record succeeds.
    async fn delete(&self, id: ResourceId) -> Result<()>;

    async fn find_items_by_unique_identifier(&self, identifier: &str) -> Result<Vec<Item>>;

    /// Items whose `asset_ids` contain `asset_id`.
    async fn find_items_referencing(&self, asset_id: ResourceId) -> Result<Vec<Item>>;
}

use async_trait::async_trait;

use crate::error::Result;
use crate::jobs::{JobHandle, JobPayload};

/// Fire-and-forget background work, delivered at least once.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, payload: JobPayload) -> Result<JobHandle>;
}

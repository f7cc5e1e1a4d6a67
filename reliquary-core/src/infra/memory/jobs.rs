use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::jobs::{DispatchStatus, JobDispatcher, JobHandle, JobId, JobPayload, JobRecord, JobState};
use crate::ports::JobQueue;

/// Upper bound on [`InMemoryJobQueue::drain`] rounds; jobs may enqueue
/// more jobs.
const MAX_DRAIN_ROUNDS: usize = 64;

/// Job queue held in memory. A payload whose dedupe key matches a pending
/// job is merged into it.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    jobs: Mutex<Vec<JobRecord>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pending(&self) -> Vec<JobRecord> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|job| job.is_pending())
            .cloned()
            .collect()
    }

    pub async fn pending_payloads(&self) -> Vec<JobPayload> {
        self.pending()
            .await
            .into_iter()
            .map(|job| job.payload)
            .collect()
    }

    pub async fn dead_letters(&self) -> Vec<JobRecord> {
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|job| job.state == JobState::DeadLetter)
            .cloned()
            .collect()
    }

    /// Pending jobs whose backoff has elapsed, oldest first.
    pub async fn ready(&self) -> Vec<JobRecord> {
        let now = Utc::now();
        self.jobs
            .lock()
            .await
            .iter()
            .filter(|job| job.is_pending() && job.available_at <= now)
            .cloned()
            .collect()
    }

    /// Apply a dispatch outcome to the job.
    pub async fn complete(&self, id: JobId, status: &DispatchStatus) {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.iter_mut().find(|job| job.id == id) else {
            return;
        };
        let now = Utc::now();
        job.updated_at = now;
        match status {
            DispatchStatus::Success => job.state = JobState::Completed,
            DispatchStatus::Retry { delay, error } => {
                job.attempts += 1;
                job.state = JobState::Deferred;
                job.last_error = Some(error.clone());
                job.available_at = now + TimeDelta::from_std(*delay).unwrap_or(TimeDelta::zero());
            }
            DispatchStatus::DeadLetter { error } => {
                job.attempts += 1;
                job.state = JobState::DeadLetter;
                job.last_error = Some(error.clone());
            }
        }
    }

    /// Run ready jobs through `dispatcher` until none are left.
    pub async fn drain(&self, dispatcher: &dyn JobDispatcher) -> Vec<(JobRecord, DispatchStatus)> {
        let mut outcomes = Vec::new();
        for _ in 0..MAX_DRAIN_ROUNDS {
            let ready = self.ready().await;
            if ready.is_empty() {
                break;
            }
            for job in ready {
                let status = dispatcher.dispatch(&job).await;
                self.complete(job.id, &status).await;
                outcomes.push((job, status));
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        outcomes
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, payload: JobPayload) -> Result<JobHandle> {
        let mut jobs = self.jobs.lock().await;
        let key = payload.dedupe_key();
        if let Some(existing) = jobs
            .iter()
            .find(|job| job.is_pending() && job.dedupe_key == key)
        {
            debug!(target: "reliquary::jobs", job_id = %existing.id, dedupe_key = %key, "merged duplicate job");
            return Ok(JobHandle::merged(existing.id, &payload));
        }
        let record = JobRecord::new(payload);
        let handle = JobHandle::accepted(record.id, &record.payload);
        jobs.push(record);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliquary_model::ResourceId;

    #[tokio::test]
    async fn duplicate_pending_payloads_are_merged() {
        let queue = InMemoryJobQueue::new();
        let asset_id = ResourceId::new();
        let first = queue
            .enqueue(JobPayload::GenerateDerivatives { asset_id })
            .await
            .unwrap();
        let second = queue
            .enqueue(JobPayload::GenerateDerivatives { asset_id })
            .await
            .unwrap();
        assert!(first.accepted);
        assert_eq!(second.merged_into, Some(first.job_id));
        assert_eq!(queue.pending().await.len(), 1);

        queue.complete(first.job_id, &DispatchStatus::Success).await;
        let third = queue
            .enqueue(JobPayload::GenerateDerivatives { asset_id })
            .await
            .unwrap();
        assert!(third.accepted);
    }
}

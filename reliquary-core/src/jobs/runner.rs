use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{Instrument, debug, debug_span, info, warn};

use crate::config::RetryConfig;
use crate::error::{Failure, FailureCode};
use crate::import::BulkImportService;
use crate::jobs::job::{JobPayload, JobRecord};
use crate::transactions::ResourceTransactions;

/// Outcome of running a single job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DispatchStatus {
    Success,
    Retry { delay: Duration, error: String },
    DeadLetter { error: String },
}

impl DispatchStatus {
    pub fn needs_retry(&self) -> bool {
        matches!(self, DispatchStatus::Retry { .. })
    }
}

/// Contract exposed to worker loops for executing dequeued jobs.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: &JobRecord) -> DispatchStatus;
}

/// Routes job payloads to the transaction registry and the bulk import
/// service, and maps their outcomes onto the retry policy.
pub struct JobRunner {
    transactions: Arc<ResourceTransactions>,
    imports: Arc<BulkImportService>,
    retry: RetryConfig,
}

impl fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("transactions", &"ResourceTransactions")
            .field("imports", &"BulkImportService")
            .field("retry", &self.retry)
            .finish()
    }
}

impl JobRunner {
    pub fn new(
        transactions: Arc<ResourceTransactions>,
        imports: Arc<BulkImportService>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transactions,
            imports,
            retry,
        }
    }

    pub async fn run(&self, job: &JobRecord) -> DispatchStatus {
        let span = debug_span!(
            target: "reliquary::jobs",
            "job",
            job_id = %job.id,
            kind = %job.payload.kind(),
            attempt = job.attempts + 1
        );
        self.execute(job).instrument(span).await
    }

    async fn execute(&self, job: &JobRecord) -> DispatchStatus {
        let outcome = match &job.payload {
            JobPayload::GenerateDerivatives { asset_id } => self
                .transactions
                .generate_derivatives(*asset_id, None)
                .await
                .map(drop),
            JobPayload::PreservationBackup { asset_id } => {
                match self.transactions.preservation_backup(*asset_id, None).await {
                    Err(failure) if failure.code == FailureCode::FileBackupAlreadyPresent => {
                        info!(
                            target: "reliquary::jobs",
                            asset_id = %asset_id,
                            "backup already present; nothing to do"
                        );
                        Ok(())
                    }
                    other => other.map(drop),
                }
            }
            JobPayload::DeleteAsset {
                asset_id,
                deleted_by,
            } => self
                .transactions
                .delete_asset(*asset_id, deleted_by.clone())
                .await
                .map(drop),
            JobPayload::GenerateItemDerivatives { item_id } => self
                .transactions
                .generate_item_derivatives(*item_id, None)
                .await
                .map(drop),
            JobPayload::ProcessBulkImport { import_id } => {
                return match self.imports.run(*import_id).await {
                    Ok(record) => {
                        debug!(
                            target: "reliquary::jobs",
                            import_id = %import_id,
                            state = %record.state,
                            "bulk import settled"
                        );
                        DispatchStatus::Success
                    }
                    Err(err) if err.is_transient() => self.retry_or_dead_letter(job, err.to_string()),
                    Err(err) => {
                        let error = err.to_string();
                        warn!(target: "reliquary::jobs", error = %error, "dead-lettering bulk import job");
                        DispatchStatus::DeadLetter { error }
                    }
                };
            }
        };

        match outcome {
            Ok(()) => DispatchStatus::Success,
            Err(failure) if failure.code == FailureCode::ResourceNotFound => {
                info!(
                    target: "reliquary::jobs",
                    error = %failure,
                    "job target no longer exists; completing"
                );
                DispatchStatus::Success
            }
            Err(failure) => self.handle_failure(job, &failure),
        }
    }

    fn handle_failure(&self, job: &JobRecord, failure: &Failure) -> DispatchStatus {
        let error = failure.message();
        if failure.is_retryable() {
            return self.retry_or_dead_letter(job, error);
        }
        warn!(
            target: "reliquary::jobs",
            code = %failure.code,
            class = ?failure.class(),
            error = %error,
            "dead-lettering job due to terminal failure"
        );
        DispatchStatus::DeadLetter { error }
    }

    fn retry_or_dead_letter(&self, job: &JobRecord, error: String) -> DispatchStatus {
        let attempt = job.attempts.saturating_add(1);
        if attempt >= self.retry.max_attempts {
            warn!(
                target: "reliquary::jobs",
                attempts = attempt,
                error = %error,
                "dead-lettering job after exhausting retries"
            );
            return DispatchStatus::DeadLetter { error };
        }
        let delay = self.retry.backoff_for(attempt);
        warn!(
            target: "reliquary::jobs",
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retrying job after transient failure"
        );
        DispatchStatus::Retry { delay, error }
    }
}

#[async_trait]
impl JobDispatcher for JobRunner {
    async fn dispatch(&self, job: &JobRecord) -> DispatchStatus {
        self.run(job).await
    }
}

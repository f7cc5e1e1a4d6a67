//! Blob bookkeeping shared by asset and item transactions.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reliquary_model::Resource;
use tracing::{debug, warn};

use crate::error::Result;
use crate::ports::BlobStore;
use crate::state::{MutationState, UploadLedger};
use crate::transaction::{AroundStep, Next, SideEffect, StepResult};

/// Delete every blob recorded in the upload ledger if any wrapped stage
/// fails, so a failed transaction leaves no orphaned files.
pub struct CleanupUploadsOnFailure {
    blobs: Arc<dyn BlobStore>,
}

impl fmt::Debug for CleanupUploadsOnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupUploadsOnFailure")
            .finish_non_exhaustive()
    }
}

impl CleanupUploadsOnFailure {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

#[async_trait]
impl<R, W> AroundStep<MutationState<R, W>> for CleanupUploadsOnFailure
where
    R: Resource,
    W: Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "cleanup_uploads_on_failure"
    }

    async fn around(
        &self,
        mut state: MutationState<R, W>,
        next: Next<'_, MutationState<R, W>>,
    ) -> StepResult<MutationState<R, W>> {
        let ledger = UploadLedger::default();
        state.uploads = ledger.clone();

        let result = next.run(state).await;
        let uploaded = ledger.take();
        if result.is_err() {
            for id in uploaded {
                debug!(target: "reliquary::transaction", blob = %id, "removing upload after failure");
                if let Err(err) = self.blobs.delete(&id).await {
                    warn!(
                        target: "reliquary::transaction",
                        blob = %id,
                        error = %err,
                        "could not remove upload after failure"
                    );
                }
            }
        }
        result
    }
}

/// Delete derivative blobs a successful transaction replaced.
pub struct DeleteSupersededDerivatives {
    blobs: Arc<dyn BlobStore>,
}

impl fmt::Debug for DeleteSupersededDerivatives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteSupersededDerivatives")
            .finish_non_exhaustive()
    }
}

impl DeleteSupersededDerivatives {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

#[async_trait]
impl<R, W> SideEffect<MutationState<R, W>> for DeleteSupersededDerivatives
where
    R: Resource,
    W: Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        "delete_superseded_derivatives"
    }

    async fn run(&self, state: &MutationState<R, W>) -> Result<()> {
        delete_all(self.blobs.as_ref(), &state.superseded_derivatives).await
    }
}

/// Attempt every deletion; report the first error after trying them all.
pub(crate) async fn delete_all(
    blobs: &dyn BlobStore,
    ids: &[reliquary_model::BlobId],
) -> Result<()> {
    let mut first_error = None;
    for id in ids {
        if let Err(err) = blobs.delete(id).await {
            warn!(target: "reliquary::transaction", blob = %id, error = %err, "blob deletion failed");
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

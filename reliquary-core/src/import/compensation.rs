use reliquary_model::ResourceId;
use tracing::{debug, error};

use crate::error::{Failure, FailureCode};
use crate::transactions::ResourceTransactions;

#[derive(Debug, Clone)]
struct CreatedAsset {
    id: ResourceId,
    filename: String,
}

/// Assets created by one import attempt, deleted again in reverse order when
/// the import cannot finish.
#[derive(Debug, Default)]
pub(crate) struct UndoList {
    created: Vec<CreatedAsset>,
}

impl UndoList {
    pub(crate) fn record(&mut self, id: ResourceId, filename: &str) {
        self.created.push(CreatedAsset {
            id,
            filename: filename.to_string(),
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.created.len()
    }

    /// Delete every recorded asset. Returns one message per delete that
    /// failed; `cause` stays the failure reported to the caller.
    pub(crate) async fn compensate(
        self,
        transactions: &ResourceTransactions,
        actor: &str,
        cause: &Failure,
    ) -> Vec<String> {
        let mut errors = Vec::new();
        for created in self.created.into_iter().rev() {
            match transactions
                .delete_asset(created.id, Some(actor.to_string()))
                .await
            {
                Ok(_) => {
                    debug!(
                        target: "reliquary::import",
                        asset_id = %created.id,
                        filename = %created.filename,
                        "compensated created asset"
                    );
                }
                Err(failure) if failure.code == FailureCode::ResourceNotFound => {}
                Err(failure) => {
                    error!(
                        target: "reliquary::import",
                        asset_id = %created.id,
                        filename = %created.filename,
                        original = %cause.code,
                        error = %failure,
                        "failed to delete asset while compensating import"
                    );
                    errors.push(format!(
                        "could not delete asset {} ({}): {}",
                        created.id,
                        created.filename,
                        failure.message()
                    ));
                }
            }
        }
        errors
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reliquary_model::{
    Asset, AssetAttributes, AssetEntry, ImportAction, ImportId, ImportJobDescription, Item,
    ItemAttributes, ResourceId, StructuralAttributes,
};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::collaborators::Collaborators;
use crate::error::{CoreError, Failure, FailureCode};
use crate::import::compensation::UndoList;
use crate::import::record::{BulkImportRecord, BulkImportState};
use crate::import::validation::{ImportValidator, ValidatedImport};
use crate::jobs::JobPayload;
use crate::ports::sha256_hex;
use crate::state::FileUpload;
use crate::transactions::ResourceTransactions;

/// What a successful import did.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub action: ImportAction,
    pub item: Item,
    pub created_assets: Vec<ResourceId>,
    pub updated_assets: Vec<ResourceId>,
    pub unchanged_assets: Vec<ResourceId>,
}

/// A failed import.
///
/// `failure` is always the error that stopped the import. Assets that could
/// not be compensated are listed in `compensation_errors`; existing assets
/// that were already updated stay updated and are listed in `manual_review`.
#[derive(Debug, Clone)]
pub struct ImportFailure {
    pub failure: Failure,
    pub compensation_errors: Vec<String>,
    pub manual_review: Vec<String>,
}

impl ImportFailure {
    /// The failure message followed by any compensation errors.
    pub fn errors(&self) -> Vec<String> {
        std::iter::once(self.failure.message())
            .chain(self.compensation_errors.iter().cloned())
            .collect()
    }
}

impl From<Failure> for ImportFailure {
    fn from(failure: Failure) -> Self {
        Self {
            failure,
            compensation_errors: Vec::new(),
            manual_review: Vec::new(),
        }
    }
}

impl fmt::Display for ImportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.failure)?;
        if !self.compensation_errors.is_empty() {
            write!(
                f,
                " (compensation failed: {})",
                self.compensation_errors.join("; ")
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ImportFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

/// Turns import job descriptions into items and assets.
///
/// Assets are created before the item that references them. If anything
/// fails after the first asset exists, the assets this import created are
/// deleted again so no partial item is ever left behind.
pub struct BulkImportService {
    transactions: Arc<ResourceTransactions>,
    collaborators: Collaborators,
}

impl fmt::Debug for BulkImportService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkImportService")
            .field("transactions", &"ResourceTransactions")
            .field("collaborators", &self.collaborators)
            .finish()
    }
}

impl BulkImportService {
    pub fn new(transactions: Arc<ResourceTransactions>, collaborators: &Collaborators) -> Self {
        Self {
            transactions,
            collaborators: collaborators.clone(),
        }
    }

    /// Validate and apply `description` now.
    pub async fn process(
        &self,
        description: &ImportJobDescription,
    ) -> Result<ImportSummary, ImportFailure> {
        let span = info_span!(
            target: "reliquary::import",
            "bulk_import",
            action = ?description.action,
            unique_identifier = description.unique_identifier.as_deref().unwrap_or("")
        );
        async {
            let validated = ImportValidator::new(&self.collaborators)
                .validate(description)
                .await?;
            let actor = description
                .imported_by
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string();

            match description.action {
                ImportAction::Create => self.create(description, &actor).await,
                ImportAction::Update => self.update(description, validated, &actor).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Record a queued import and schedule it as a background job.
    pub async fn enqueue(
        &self,
        description: ImportJobDescription,
    ) -> Result<BulkImportRecord, Failure> {
        let created_by = description
            .imported_by
            .as_deref()
            .map(str::trim)
            .filter(|actor| !actor.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Failure::new(FailureCode::InvalidImport).with_detail("imported_by can't be blank")
            })?;

        let record = BulkImportRecord::queued(description, created_by);
        self.collaborators
            .imports
            .save(record.clone())
            .await
            .map_err(|err| Failure::from_core(FailureCode::ImportFailed, err))?;
        let handle = self
            .collaborators
            .jobs
            .enqueue(JobPayload::ProcessBulkImport {
                import_id: record.id,
            })
            .await
            .map_err(|err| Failure::from_core(FailureCode::ImportFailed, err))?;

        info!(
            target: "reliquary::import",
            import_id = %record.id,
            job_id = %handle.job_id,
            "bulk import queued"
        );
        Ok(record)
    }

    /// Only queued imports can be cancelled.
    pub async fn cancel(&self, id: ImportId) -> Result<BulkImportRecord, Failure> {
        let mut record = self
            .collaborators
            .imports
            .find(id)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorLoadingResource, err))?
            .ok_or_else(|| {
                Failure::new(FailureCode::ResourceNotFound)
                    .with_detail(format!("bulk import {id} not found"))
            })?;

        if record.state != BulkImportState::Queued {
            return Err(Failure::new(FailureCode::ImportNotCancellable)
                .with_detail(format!("bulk import {id} is {}", record.state)));
        }

        record.transition(BulkImportState::Cancelled);
        self.collaborators
            .imports
            .save(record.clone())
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorSavingResource, err))?;
        info!(target: "reliquary::import", import_id = %id, "bulk import cancelled");
        Ok(record)
    }

    /// Execute a queued import and record its outcome in the ledger.
    ///
    /// Import failures are recorded on the returned record; an `Err` means
    /// the ledger itself could not be read or written.
    pub async fn run(&self, id: ImportId) -> Result<BulkImportRecord, CoreError> {
        let mut record = self
            .collaborators
            .imports
            .find(id)
            .await?
            .ok_or_else(|| CoreError::not_found("bulk import", id))?;

        if record.state == BulkImportState::Cancelled {
            info!(target: "reliquary::import", import_id = %id, "skipping cancelled bulk import");
            return Ok(record);
        }
        if record.state.is_terminal() {
            debug!(
                target: "reliquary::import",
                import_id = %id,
                state = %record.state,
                "bulk import already settled"
            );
            return Ok(record);
        }

        record.transition(BulkImportState::Processing);
        self.collaborators.imports.save(record.clone()).await?;

        match self.process(&record.description).await {
            Ok(summary) => {
                record.item_id = Some(summary.item.id);
                record.errors.clear();
                record.manual_review.clear();
                record.transition(BulkImportState::Successful);
            }
            Err(failure) => {
                record.errors = failure.errors();
                record.manual_review = failure.manual_review;
                record.transition(BulkImportState::Failed);
            }
        }

        self.collaborators.imports.save(record.clone()).await?;
        info!(
            target: "reliquary::import",
            import_id = %id,
            state = %record.state,
            "bulk import finished"
        );
        Ok(record)
    }

    async fn create(
        &self,
        description: &ImportJobDescription,
        actor: &str,
    ) -> Result<ImportSummary, ImportFailure> {
        let assets = description
            .assets
            .as_ref()
            .ok_or_else(|| Failure::internal("validated create import has no assets"))?;

        let mut undo = UndoList::default();
        let mut by_filename = HashMap::new();
        let mut created = Vec::new();
        for entry in assets.entries_by_filename() {
            match self.ingest(entry, &assets.storage, actor, &mut undo).await {
                Ok(asset) => {
                    by_filename.insert(entry.filename.clone(), asset.id);
                    created.push(asset.id);
                }
                Err(failure) => return Err(self.abort(failure, undo, actor, Vec::new()).await),
            }
        }

        let arranged = assets
            .arranged
            .iter()
            .filter_map(|entry| by_filename.get(&entry.filename).copied())
            .collect();
        let attributes = ItemAttributes {
            unique_identifier: description.unique_identifier.clone(),
            human_readable_name: description.human_readable_name.clone(),
            descriptive_metadata: Some(description.metadata.clone()),
            structural_metadata: Some(StructuralAttributes {
                arranged_asset_ids: Some(arranged),
                viewing_direction: description.viewing_direction.clone(),
                viewing_hint: description.viewing_hint.clone(),
            }),
            asset_ids: Some(created.clone()),
            internal_notes: (!description.internal_notes.is_empty())
                .then(|| description.internal_notes.clone()),
            ..Default::default()
        };

        match self.transactions.create_item(attributes, actor).await {
            Ok(item) => {
                info!(
                    target: "reliquary::import",
                    item_id = %item.id,
                    assets = created.len(),
                    "created item from import"
                );
                Ok(ImportSummary {
                    action: ImportAction::Create,
                    item,
                    created_assets: created,
                    updated_assets: Vec::new(),
                    unchanged_assets: Vec::new(),
                })
            }
            Err(failure) => Err(self.abort(failure, undo, actor, Vec::new()).await),
        }
    }

    async fn update(
        &self,
        description: &ImportJobDescription,
        validated: ValidatedImport,
        actor: &str,
    ) -> Result<ImportSummary, ImportFailure> {
        let item = validated
            .existing_item
            .ok_or_else(|| Failure::internal("validated update import has no item"))?;
        let existing = validated.existing_assets;

        let mut attributes = ItemAttributes {
            human_readable_name: description.human_readable_name.clone(),
            descriptive_metadata: (!description.metadata.is_empty())
                .then(|| description.metadata.clone()),
            internal_notes: (!description.internal_notes.is_empty())
                .then(|| description.internal_notes.clone()),
            ..Default::default()
        };
        let mut structural = StructuralAttributes {
            arranged_asset_ids: None,
            viewing_direction: description.viewing_direction.clone(),
            viewing_hint: description.viewing_hint.clone(),
        };

        let mut undo = UndoList::default();
        let mut created = Vec::new();
        let mut updated = Vec::new();
        let mut unchanged = Vec::new();
        let mut manual_review = Vec::new();

        if let Some(assets) = &description.assets {
            let mut by_filename: HashMap<String, ResourceId> = existing
                .iter()
                .map(|(filename, asset)| (filename.clone(), asset.id))
                .collect();
            let entries = assets.entries_by_filename();

            for entry in entries.iter().filter(|e| !existing.contains_key(&e.filename)) {
                match self.ingest(entry, &assets.storage, actor, &mut undo).await {
                    Ok(asset) => {
                        by_filename.insert(entry.filename.clone(), asset.id);
                        created.push(asset.id);
                    }
                    Err(failure) => {
                        return Err(self.abort(failure, undo, actor, Vec::new()).await);
                    }
                }
            }

            for entry in &entries {
                let Some(current) = existing.get(&entry.filename) else {
                    continue;
                };
                match self.refresh(entry, current, &assets.storage, actor).await {
                    Ok(Some(asset)) => {
                        manual_review.push(format!("{} ({})", entry.filename, asset.id));
                        updated.push(asset.id);
                    }
                    Ok(None) => unchanged.push(current.id),
                    Err(failure) => {
                        return Err(self.abort(failure, undo, actor, manual_review).await);
                    }
                }
            }

            attributes.asset_ids = Some(
                entries
                    .iter()
                    .filter_map(|entry| by_filename.get(&entry.filename).copied())
                    .collect(),
            );
            structural.arranged_asset_ids = Some(
                assets
                    .arranged
                    .iter()
                    .filter_map(|entry| by_filename.get(&entry.filename).copied())
                    .collect(),
            );
        }
        attributes.structural_metadata = Some(structural);

        match self
            .transactions
            .update_item(item.id, attributes, Some(actor.to_string()))
            .await
        {
            Ok(item) => {
                info!(
                    target: "reliquary::import",
                    item_id = %item.id,
                    created = created.len(),
                    updated = updated.len(),
                    unchanged = unchanged.len(),
                    "updated item from import"
                );
                Ok(ImportSummary {
                    action: ImportAction::Update,
                    item,
                    created_assets: created,
                    updated_assets: updated,
                    unchanged_assets: unchanged,
                })
            }
            Err(failure) => Err(self.abort(failure, undo, actor, manual_review).await),
        }
    }

    /// Create an asset and attach its staged file.
    async fn ingest(
        &self,
        entry: &AssetEntry,
        storage: &str,
        actor: &str,
        undo: &mut UndoList,
    ) -> Result<Asset, Failure> {
        let attributes = AssetAttributes {
            original_filename: Some(entry.filename.clone()),
            label: entry.label.clone(),
            annotations: Some(entry.annotations.clone()),
            transcriptions: Some(entry.transcriptions.clone()),
        };
        let asset = self.transactions.create_asset(attributes, actor).await?;
        undo.record(asset.id, &entry.filename);

        let content = self.read_staged(storage, &entry.filename).await?;
        self.transactions
            .update_asset(
                asset.id,
                AssetAttributes::default(),
                Some(actor.to_string()),
                Some(FileUpload::new(entry.filename.clone(), content)),
            )
            .await
    }

    /// Update an existing asset when its staged file or declared metadata
    /// differs from what is stored. `None` when nothing changed.
    async fn refresh(
        &self,
        entry: &AssetEntry,
        current: &Asset,
        storage: &str,
        actor: &str,
    ) -> Result<Option<Asset>, Failure> {
        let staged = self
            .collaborators
            .staging
            .exists(storage, &entry.filename)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorReadingFile, err))?;
        let file = if staged {
            let content = self.read_staged(storage, &entry.filename).await?;
            (current.sha256() != Some(sha256_hex(&content).as_str()))
                .then(|| FileUpload::new(entry.filename.clone(), content))
        } else {
            None
        };

        let label = entry
            .label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty());
        let metadata_changed = label != current.label.as_deref()
            || entry.annotations != current.annotations
            || entry.transcriptions != current.transcriptions;

        if file.is_none() && !metadata_changed {
            debug!(
                target: "reliquary::import",
                asset_id = %current.id,
                filename = %entry.filename,
                "asset unchanged; skipping update"
            );
            return Ok(None);
        }

        let attributes = AssetAttributes {
            original_filename: None,
            label: Some(entry.label.clone().unwrap_or_default()),
            annotations: Some(entry.annotations.clone()),
            transcriptions: Some(entry.transcriptions.clone()),
        };
        self.transactions
            .update_asset(current.id, attributes, Some(actor.to_string()), file)
            .await
            .map(Some)
    }

    async fn read_staged(&self, storage: &str, filename: &str) -> Result<Vec<u8>, Failure> {
        self.collaborators
            .staging
            .read(storage, filename)
            .await
            .map_err(|err| {
                Failure::from_core(FailureCode::ErrorReadingFile, err)
                    .with_detail(format!("{storage}/{filename}"))
            })
    }

    async fn abort(
        &self,
        failure: Failure,
        undo: UndoList,
        actor: &str,
        manual_review: Vec<String>,
    ) -> ImportFailure {
        warn!(
            target: "reliquary::import",
            code = %failure.code,
            created = undo.len(),
            updated = manual_review.len(),
            error = %failure,
            "bulk import failed; compensating"
        );
        let compensation_errors = undo.compensate(&self.transactions, actor, &failure).await;
        ImportFailure {
            failure,
            compensation_errors,
            manual_review,
        }
    }
}

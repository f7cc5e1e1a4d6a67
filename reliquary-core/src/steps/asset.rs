//! Steps specific to asset transactions.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reliquary_model::{
    Asset, AssetField, DerivativeRecord, Item, PreservationEvent, PreservationEventType, Resource,
};
use tracing::{debug, error, warn};

use crate::change_set::ChangeSet;
use crate::config::DerivativeConfig;
use crate::error::{CoreError, Failure, FailureCode, Result};
use crate::jobs::JobPayload;
use crate::ports::{
    BlobStore, Characterizer, DerivativeGenerator, JobQueue, RepositoryStore, ScanVerdict,
    VirusScanner, sha256_hex,
};
use crate::state::AssetState;
use crate::steps::files::delete_all;
use crate::transaction::{AroundStep, Next, SideEffect, Step, StepResult};

/// Label of the preservation file in the primary blob store.
pub const PRESERVATION_LABEL: &str = "preservation";
/// Label of the backup copy in the backup blob store.
pub const BACKUP_LABEL: &str = "preservation_backup";

/// Scan an incoming file before anything is stored.
pub struct VirusCheck {
    scanner: Arc<dyn VirusScanner>,
    max_bytes: u64,
}

impl fmt::Debug for VirusCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirusCheck")
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl VirusCheck {
    pub fn new(scanner: Arc<dyn VirusScanner>, max_bytes: u64) -> Self {
        Self { scanner, max_bytes }
    }
}

#[async_trait]
impl Step<AssetState> for VirusCheck {
    fn name(&self) -> &'static str {
        "virus_check"
    }

    async fn call(&self, mut state: AssetState) -> StepResult<AssetState> {
        let Some(file) = state.work.file.as_ref() else {
            return Ok(state);
        };
        let implementer = state.updated_by.clone().unwrap_or_default();

        let size = file.content.len() as u64;
        if size > self.max_bytes {
            warn!(
                target: "reliquary::transaction",
                filename = %file.original_filename,
                size,
                "file exceeds virus scan limit, not scanned"
            );
            state.work.preceding_events.push(PreservationEvent::warning(
                PreservationEventType::VirusCheck,
                implementer,
                format!(
                    "File not scanned: {size} bytes exceeds the {} byte scan limit",
                    self.max_bytes
                ),
            ));
            return Ok(state);
        }

        let verdict = self
            .scanner
            .scan(&file.content)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorScanningFile, err))?;
        match verdict {
            ScanVerdict::Clean => {
                state.work.preceding_events.push(PreservationEvent::success(
                    PreservationEventType::VirusCheck,
                    implementer,
                    "File scanned, no virus found",
                ));
                Ok(state)
            }
            ScanVerdict::Infected { signature } => Err(Failure::new(FailureCode::VirusDetected)
                .with_detail(format!(
                    "{} is infected: {signature}",
                    file.original_filename
                ))),
        }
    }
}

/// Upload the incoming file to the primary blob store and stage it as the
/// preservation file.
pub struct AddPreservationFile {
    blobs: Arc<dyn BlobStore>,
}

impl fmt::Debug for AddPreservationFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddPreservationFile")
            .finish_non_exhaustive()
    }
}

impl AddPreservationFile {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

#[async_trait]
impl Step<AssetState> for AddPreservationFile {
    fn name(&self) -> &'static str {
        "add_preservation_file"
    }

    async fn call(&self, mut state: AssetState) -> StepResult<AssetState> {
        let Some(file) = state.work.file.as_ref() else {
            return Ok(state);
        };
        let change_set = state
            .change_set
            .as_mut()
            .ok_or_else(|| Failure::internal("no change set staged"))?;
        let asset_id = change_set.proposed().id;

        let checksum = sha256_hex(&file.content);
        let stored = self
            .blobs
            .upload(&file.content, asset_id, PRESERVATION_LABEL)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorUploadingFile, err))?;
        if change_set.original().preservation_file_id.as_ref() != Some(&stored.id) {
            state.uploads.record(stored.id.clone());
        }
        if stored.checksum != checksum {
            return Err(Failure::new(FailureCode::ErrorUploadingFile).with_detail(format!(
                "fixity mismatch for {}: sent {checksum}, stored {}",
                file.original_filename, stored.checksum
            )));
        }

        let asset = change_set.stage();
        asset.preservation_file_id = Some(stored.id);
        asset.original_filename = Some(file.original_filename.clone());
        state.work.checksum = Some(checksum);
        Ok(state)
    }
}

/// Technical metadata for the incoming file; the checksum comes from the
/// core, never from the characterizer.
pub struct CharacterizeFile {
    characterizer: Arc<dyn Characterizer>,
}

impl fmt::Debug for CharacterizeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharacterizeFile")
            .finish_non_exhaustive()
    }
}

impl CharacterizeFile {
    pub fn new(characterizer: Arc<dyn Characterizer>) -> Self {
        Self { characterizer }
    }
}

#[async_trait]
impl Step<AssetState> for CharacterizeFile {
    fn name(&self) -> &'static str {
        "characterize_file"
    }

    async fn call(&self, mut state: AssetState) -> StepResult<AssetState> {
        let Some(file) = state.work.file.as_ref() else {
            return Ok(state);
        };
        let mut metadata = self
            .characterizer
            .characterize(&file.content, &file.original_filename)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorCharacterizingFile, err))?;
        metadata.size = Some(file.content.len() as u64);
        metadata.sha256 = Some(
            state
                .work
                .checksum
                .clone()
                .unwrap_or_else(|| sha256_hex(&file.content)),
        );
        state.change_set_mut()?.stage().technical_metadata = metadata;
        Ok(state)
    }
}

/// Existing derivatives no longer describe a replaced file.
pub fn mark_derivatives_stale(mut state: AssetState) -> StepResult<AssetState> {
    let change_set = state.change_set_mut()?;
    if change_set.is_changed(AssetField::PreservationFile)
        && change_set.original().preservation_file_id.is_some()
    {
        for derivative in &mut change_set.stage().derivatives {
            derivative.stale = true;
        }
    }
    Ok(state)
}

/// A backup copy of a replaced file is detached and deleted after save.
pub fn detach_preservation_backup(mut state: AssetState) -> StepResult<AssetState> {
    let change_set = state.change_set_mut()?;
    if change_set.is_changed(AssetField::PreservationFile)
        && !change_set.proposed().preservation_copies_ids.is_empty()
    {
        let detached = std::mem::take(&mut change_set.stage().preservation_copies_ids);
        state.work.superseded_backups = detached;
    }
    Ok(state)
}

pub fn require_preservation_file(state: AssetState) -> StepResult<AssetState> {
    let asset = state.loaded()?;
    if asset.preservation_file_id.is_none() {
        return Err(Failure::new(FailureCode::MissingPreservationFile)
            .with_detail(format!("asset {} has no preservation file", asset.id)));
    }
    Ok(state)
}

pub fn require_mime_type(state: AssetState) -> StepResult<AssetState> {
    let asset = state.loaded()?;
    if asset
        .technical_metadata
        .mime_type
        .as_deref()
        .is_none_or(str::is_empty)
    {
        return Err(Failure::new(FailureCode::MissingMimeType)
            .with_detail(format!("asset {} has no mime type", asset.id)));
    }
    Ok(state)
}

/// Backup copies are written once per preservation file.
pub fn refuse_existing_backup(state: AssetState) -> StepResult<AssetState> {
    let asset = state.loaded()?;
    if !asset.preservation_copies_ids.is_empty() {
        return Err(Failure::new(FailureCode::FileBackupAlreadyPresent)
            .with_detail(format!("asset {} already has a backup copy", asset.id)));
    }
    Ok(state)
}

/// Copy the preservation file into the backup store.
pub struct ReplicatePreservationFile {
    blobs: Arc<dyn BlobStore>,
    backups: Arc<dyn BlobStore>,
}

impl fmt::Debug for ReplicatePreservationFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatePreservationFile")
            .finish_non_exhaustive()
    }
}

impl ReplicatePreservationFile {
    pub fn new(blobs: Arc<dyn BlobStore>, backups: Arc<dyn BlobStore>) -> Self {
        Self { blobs, backups }
    }
}

#[async_trait]
impl Step<AssetState> for ReplicatePreservationFile {
    fn name(&self) -> &'static str {
        "replicate_preservation_file"
    }

    async fn call(&self, mut state: AssetState) -> StepResult<AssetState> {
        let asset = state.loaded()?;
        let source = asset
            .preservation_file_id
            .clone()
            .ok_or_else(|| Failure::new(FailureCode::MissingPreservationFile))?;
        let asset_id = asset.id;
        let expected = asset.sha256().map(str::to_string);

        let content = self
            .blobs
            .read(&source)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorReadingFile, err))?;
        let stored = self
            .backups
            .upload(&content, asset_id, BACKUP_LABEL)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorUploadingFile, err))?;
        state.uploads.record(stored.id.clone());
        if expected.as_deref().is_some_and(|sha| sha != stored.checksum) {
            return Err(Failure::new(FailureCode::ErrorUploadingFile)
                .with_detail(format!("backup of {source} does not match its recorded checksum")));
        }

        let implementer = state.updated_by.clone().unwrap_or_default();
        let asset = state.change_set_mut()?.stage();
        asset.preservation_copies_ids = vec![stored.id.clone()];
        asset.preservation_events.push(
            PreservationEvent::success(
                PreservationEventType::Replication,
                implementer,
                format!("Preservation file replicated to {}", stored.id),
            )
            .at(Utc::now()),
        );
        Ok(state)
    }
}

/// Provide a scratch directory for the wrapped stages and remove it
/// afterwards whatever the outcome.
#[derive(Debug)]
pub struct TempWorkspace;

#[async_trait]
impl AroundStep<AssetState> for TempWorkspace {
    fn name(&self) -> &'static str {
        "temp_workspace"
    }

    async fn around(&self, mut state: AssetState, next: Next<'_, AssetState>) -> StepResult<AssetState> {
        let dir = tempfile::Builder::new()
            .prefix("reliquary-")
            .tempdir()
            .map_err(|err| Failure::internal("could not create workspace").with_source(err.into()))?;
        state.work.workspace = Some(dir.path().to_path_buf());

        let result = next.run(state).await.map(|mut state| {
            state.work.workspace = None;
            state.work.source_path = None;
            state
        });
        let path = dir.path().to_path_buf();
        if let Err(err) = dir.close() {
            warn!(target: "reliquary::transaction", path = %path.display(), error = %err, "could not remove workspace");
        }
        result
    }
}

/// Copy the preservation file into the workspace for the generator.
pub struct DownloadSource {
    blobs: Arc<dyn BlobStore>,
}

impl fmt::Debug for DownloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadSource")
            .finish_non_exhaustive()
    }
}

impl DownloadSource {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

#[async_trait]
impl Step<AssetState> for DownloadSource {
    fn name(&self) -> &'static str {
        "download_source"
    }

    async fn call(&self, mut state: AssetState) -> StepResult<AssetState> {
        let asset = state.loaded()?;
        let source = asset
            .preservation_file_id
            .clone()
            .ok_or_else(|| Failure::new(FailureCode::MissingPreservationFile))?;
        let workspace = state
            .work
            .workspace
            .clone()
            .ok_or_else(|| Failure::internal("no workspace prepared"))?;
        let path = workspace.join(source_filename(asset));

        let content = self
            .blobs
            .read(&source)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorReadingFile, err))?;
        tokio::fs::write(&path, &content)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorGeneratingDerivatives, err.into()))?;
        state.work.source_path = Some(path);
        Ok(state)
    }
}

/// A filesystem-safe name that keeps the original extension, which some
/// generators use to pick a decoder.
fn source_filename(asset: &Asset) -> PathBuf {
    let extension = asset
        .original_filename
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    match extension {
        Some(ext) => PathBuf::from(format!("source.{ext}")),
        None => PathBuf::from("source"),
    }
}

/// Generate every configured derivative type and replace the asset's
/// derivative set.
pub struct GenerateDerivativeFiles {
    generator: Arc<dyn DerivativeGenerator>,
    blobs: Arc<dyn BlobStore>,
    config: DerivativeConfig,
}

impl fmt::Debug for GenerateDerivativeFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerateDerivativeFiles")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GenerateDerivativeFiles {
    pub fn new(
        generator: Arc<dyn DerivativeGenerator>,
        blobs: Arc<dyn BlobStore>,
        config: DerivativeConfig,
    ) -> Self {
        Self {
            generator,
            blobs,
            config,
        }
    }
}

#[async_trait]
impl Step<AssetState> for GenerateDerivativeFiles {
    fn name(&self) -> &'static str {
        "generate_derivatives"
    }

    async fn call(&self, mut state: AssetState) -> StepResult<AssetState> {
        let source = state
            .work
            .source_path
            .clone()
            .ok_or_else(|| Failure::internal("source file was not downloaded"))?;
        let asset = state.loaded()?;
        let asset_id = asset.id;
        let mime_type = asset
            .technical_metadata
            .mime_type
            .clone()
            .ok_or_else(|| Failure::new(FailureCode::MissingMimeType))?;
        let previous = asset.derivatives.clone();

        let generated_at = Utc::now();
        let mut derivatives = Vec::new();
        for kind in self.config.types_for(&mime_type) {
            let output = self
                .generator
                .generate(&source, &mime_type, *kind)
                .await
                .map_err(|err| {
                    Failure::from_core(FailureCode::ErrorGeneratingDerivatives, err)
                        .with_detail(format!("{kind} for asset {asset_id}"))
                })?;
            let Some(content) = output else {
                debug!(target: "reliquary::transaction", %asset_id, derivative = %kind, "generator declined");
                continue;
            };
            let stored = self
                .blobs
                .upload(&content, asset_id, kind.as_str())
                .await
                .map_err(|err| Failure::from_core(FailureCode::ErrorUploadingFile, err))?;
            if !previous.iter().any(|d| d.file_id == stored.id) {
                state.uploads.record(stored.id.clone());
            }
            derivatives.push(DerivativeRecord::fresh(
                *kind,
                kind.output_mime(&mime_type),
                stored.id,
                generated_at,
            ));
        }

        state.superseded_derivatives = previous
            .into_iter()
            .filter(|old| !derivatives.iter().any(|new| new.file_id == old.file_id))
            .map(|old| old.file_id)
            .collect();
        state.change_set_mut()?.stage().derivatives = derivatives;
        Ok(state)
    }
}

/// Load the item that owns the asset, if any.
pub struct FindParentItem {
    store: Arc<dyn RepositoryStore>,
}

impl fmt::Debug for FindParentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindParentItem")
            .finish_non_exhaustive()
    }
}

impl FindParentItem {
    pub fn new(store: Arc<dyn RepositoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Step<AssetState> for FindParentItem {
    fn name(&self) -> &'static str {
        "find_parent_item"
    }

    async fn call(&self, mut state: AssetState) -> StepResult<AssetState> {
        let asset_id = state.loaded()?.id;
        let mut parents = self
            .store
            .find_items_referencing(asset_id)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorLoadingResource, err))?;
        if parents.len() > 1 {
            let ids: Vec<String> = parents.iter().map(|item| item.id.to_string()).collect();
            error!(
                target: "reliquary::transaction",
                %asset_id,
                parents = %ids.join(", "),
                "asset belongs to more than one item"
            );
            return Err(Failure::new(FailureCode::MultipleParentItemsFound)
                .with_detail(format!("asset {asset_id} is referenced by {}", ids.join(", "))));
        }
        state.work.parent_item = parents.pop();
        Ok(state)
    }
}

/// An item's thumbnail may only go once it is the item's last asset.
pub fn guard_thumbnail(state: AssetState) -> StepResult<AssetState> {
    let asset_id = state.loaded()?.id;
    if let Some(parent) = &state.work.parent_item
        && parent.thumbnail_asset_id == Some(asset_id)
        && parent.asset_ids.iter().any(|id| *id != asset_id)
    {
        return Err(Failure::new(FailureCode::ThumbnailDeletionRefused).with_detail(format!(
            "asset {asset_id} is the thumbnail of item {}; choose another thumbnail first",
            parent.id
        )));
    }
    Ok(state)
}

/// Remove the asset from its parent item and save the item.
pub struct DetachFromParentItem {
    store: Arc<dyn RepositoryStore>,
}

impl fmt::Debug for DetachFromParentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetachFromParentItem")
            .finish_non_exhaustive()
    }
}

impl DetachFromParentItem {
    pub fn new(store: Arc<dyn RepositoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Step<AssetState> for DetachFromParentItem {
    fn name(&self) -> &'static str {
        "detach_from_parent_item"
    }

    async fn call(&self, mut state: AssetState) -> StepResult<AssetState> {
        let Some(parent) = state.work.parent_item.take() else {
            return Ok(state);
        };
        let asset_id = state.loaded()?.id;

        let mut change_set = ChangeSet::for_existing(parent);
        change_set.stage().unlink_asset(asset_id);
        if let Some(actor) = state.updated_by.as_deref() {
            change_set.stage().assign_actor(actor, false);
        }
        if let Err(errors) = change_set.validate() {
            return Err(Failure::validation(errors, change_set.snapshot()));
        }
        let expected = change_set.expected_lock_token();
        let snapshot = change_set.snapshot();
        let mut item: Item = change_set
            .sync()
            .map_err(|err| Failure::internal(err.to_string()))?;
        item.touch(Utc::now(), false);

        let saved = self
            .store
            .save(item.into_record(), expected)
            .await
            .map_err(|err| {
                Failure::from_core(FailureCode::ErrorSavingResource, err).with_change_set(snapshot)
            })?;
        state.work.parent_item = Item::from_record(saved);
        Ok(state)
    }
}

/// Delete the preservation file, derivatives and backup copies.
pub struct DeleteAssetFiles {
    blobs: Arc<dyn BlobStore>,
    backups: Arc<dyn BlobStore>,
}

impl fmt::Debug for DeleteAssetFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteAssetFiles")
            .finish_non_exhaustive()
    }
}

impl DeleteAssetFiles {
    pub fn new(blobs: Arc<dyn BlobStore>, backups: Arc<dyn BlobStore>) -> Self {
        Self { blobs, backups }
    }
}

#[async_trait]
impl Step<AssetState> for DeleteAssetFiles {
    fn name(&self) -> &'static str {
        "delete_asset_files"
    }

    async fn call(&self, state: AssetState) -> StepResult<AssetState> {
        let asset = state.loaded()?;
        let primary = delete_all(self.blobs.as_ref(), &asset.primary_blob_ids()).await;
        let backups = delete_all(self.backups.as_ref(), &asset.preservation_copies_ids).await;
        primary
            .and(backups)
            .map_err(|err| Failure::from_core(FailureCode::ErrorDeletingFile, err))?;
        Ok(state)
    }
}

/// Delete backup copies of a file that was replaced.
pub struct DeleteSupersededBackups {
    backups: Arc<dyn BlobStore>,
}

impl fmt::Debug for DeleteSupersededBackups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteSupersededBackups")
            .finish_non_exhaustive()
    }
}

impl DeleteSupersededBackups {
    pub fn new(backups: Arc<dyn BlobStore>) -> Self {
        Self { backups }
    }
}

#[async_trait]
impl SideEffect<AssetState> for DeleteSupersededBackups {
    fn name(&self) -> &'static str {
        "delete_superseded_backups"
    }

    async fn run(&self, state: &AssetState) -> Result<()> {
        delete_all(self.backups.as_ref(), &state.work.superseded_backups).await
    }
}

/// Request derivative generation and backup when the saved asset needs
/// them.
pub struct EnqueueFollowUpJobs {
    jobs: Arc<dyn JobQueue>,
    derivatives: DerivativeConfig,
}

impl fmt::Debug for EnqueueFollowUpJobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnqueueFollowUpJobs")
            .field("derivatives", &self.derivatives)
            .finish_non_exhaustive()
    }
}

impl EnqueueFollowUpJobs {
    pub fn new(jobs: Arc<dyn JobQueue>, derivatives: DerivativeConfig) -> Self {
        Self { jobs, derivatives }
    }
}

#[async_trait]
impl SideEffect<AssetState> for EnqueueFollowUpJobs {
    fn name(&self) -> &'static str {
        "enqueue_follow_up_jobs"
    }

    async fn run(&self, state: &AssetState) -> Result<()> {
        let asset = state
            .resource
            .as_ref()
            .ok_or_else(|| CoreError::Internal("asset was not saved".into()))?;
        let configured = asset
            .technical_metadata
            .mime_type
            .as_deref()
            .map(|mime| self.derivatives.types_for(mime))
            .unwrap_or_default();
        if asset.needs_derivatives(configured) {
            self.jobs
                .enqueue(JobPayload::GenerateDerivatives { asset_id: asset.id })
                .await?;
        }
        if asset.needs_backup() {
            self.jobs
                .enqueue(JobPayload::PreservationBackup { asset_id: asset.id })
                .await?;
        }
        Ok(())
    }
}

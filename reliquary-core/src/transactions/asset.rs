use reliquary_model::Asset;

use crate::collaborators::Collaborators;
use crate::config::PipelineConfig;
use crate::preservation::AddPreservationEvents;
use crate::state::AssetState;
use crate::steps::asset::{
    AddPreservationFile, CharacterizeFile, DeleteAssetFiles, DeleteSupersededBackups,
    DetachFromParentItem, DownloadSource, EnqueueFollowUpJobs, FindParentItem,
    GenerateDerivativeFiles, ReplicatePreservationFile, TempWorkspace, VirusCheck,
    detach_preservation_backup, guard_thumbnail, mark_derivatives_stale, refuse_existing_backup,
    require_mime_type, require_preservation_file,
};
use crate::steps::files::{CleanupUploadsOnFailure, DeleteSupersededDerivatives};
use crate::steps::resource::{
    CreateChangeSet, DeleteResource, FindResource, SaveResource, require_updated_by, validate,
};
use crate::transaction::Transaction;

use super::TransactionName;

pub(super) fn create_asset(c: &Collaborators) -> Transaction<AssetState> {
    Transaction::named(TransactionName::CreateAsset.as_str())
        .step(CreateChangeSet)
        .pure("require_updated_by", require_updated_by::<Asset, _>)
        .pure("validate", validate::<Asset, _>)
        .step(SaveResource::new(c.repository.clone()))
        .build()
}

pub(super) fn update_asset(c: &Collaborators, config: &PipelineConfig) -> Transaction<AssetState> {
    Transaction::named(TransactionName::UpdateAsset.as_str())
        .step(FindResource::new(c.repository.clone()))
        .step(CreateChangeSet)
        .pure("require_updated_by", require_updated_by::<Asset, _>)
        .step(VirusCheck::new(c.scanner.clone(), config.virus_scan_max_bytes))
        .around(CleanupUploadsOnFailure::new(c.blobs.clone()))
        .step(AddPreservationFile::new(c.blobs.clone()))
        .step(CharacterizeFile::new(c.characterizer.clone()))
        .pure("mark_derivatives_stale", mark_derivatives_stale)
        .pure("detach_preservation_backup", detach_preservation_backup)
        .step(AddPreservationEvents)
        .pure("validate", validate::<Asset, _>)
        .step(SaveResource::new(c.repository.clone()))
        .side_effect(DeleteSupersededBackups::new(c.backups.clone()))
        .side_effect(EnqueueFollowUpJobs::new(
            c.jobs.clone(),
            config.derivatives.clone(),
        ))
        .build()
}

pub(super) fn delete_asset(c: &Collaborators) -> Transaction<AssetState> {
    Transaction::named(TransactionName::DeleteAsset.as_str())
        .step(FindResource::new(c.repository.clone()))
        .step(FindParentItem::new(c.repository.clone()))
        .pure("guard_thumbnail", guard_thumbnail)
        .step(DetachFromParentItem::new(c.repository.clone()))
        .step(DeleteAssetFiles::new(c.blobs.clone(), c.backups.clone()))
        .step(DeleteResource::new(c.repository.clone()))
        .build()
}

pub(super) fn generate_derivatives(
    c: &Collaborators,
    config: &PipelineConfig,
) -> Transaction<AssetState> {
    Transaction::named(TransactionName::GenerateDerivatives.as_str())
        .step(FindResource::new(c.repository.clone()))
        .pure("require_preservation_file", require_preservation_file)
        .pure("require_mime_type", require_mime_type)
        .step(CreateChangeSet)
        .around(TempWorkspace)
        .around(CleanupUploadsOnFailure::new(c.blobs.clone()))
        .step(DownloadSource::new(c.blobs.clone()))
        .step(GenerateDerivativeFiles::new(
            c.derivatives.clone(),
            c.blobs.clone(),
            config.derivatives.clone(),
        ))
        .pure("validate", validate::<Asset, _>)
        .step(SaveResource::new(c.repository.clone()))
        .side_effect(DeleteSupersededDerivatives::new(c.blobs.clone()))
        .build()
}

pub(super) fn preservation_backup(c: &Collaborators) -> Transaction<AssetState> {
    Transaction::named(TransactionName::PreservationBackup.as_str())
        .step(FindResource::new(c.repository.clone()))
        .pure("require_preservation_file", require_preservation_file)
        .pure("refuse_existing_backup", refuse_existing_backup)
        .step(CreateChangeSet)
        .around(CleanupUploadsOnFailure::new(c.backups.clone()))
        .step(ReplicatePreservationFile::new(c.blobs.clone(), c.backups.clone()))
        .pure("validate", validate::<Asset, _>)
        .step(SaveResource::new(c.repository.clone()))
        .build()
}

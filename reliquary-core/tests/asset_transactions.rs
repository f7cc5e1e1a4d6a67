mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reliquary_core::infra::EICAR_SIGNATURE;
use reliquary_core::infra::memory::{InMemoryRepositoryStore, InMemoryStack};
use reliquary_core::jobs::JobPayload;
use reliquary_core::model::{
    AssetAttributes, DerivativeType, EventOutcome, Item, LockToken, PreservationEventType,
    Resource, ResourceId, ResourceRecord,
};
use reliquary_core::ports::{RepositoryStore, sha256_hex};
use reliquary_core::{FailureClass, FailureCode, FileUpload, PipelineConfig, Reliquary};

use support::{ACTOR, Harness, tiff};

/// Repository that lets another writer slip in right after the next read.
struct ContendedRepository {
    inner: Arc<InMemoryRepositoryStore>,
    contend: AtomicBool,
}

#[async_trait]
impl RepositoryStore for ContendedRepository {
    async fn find(&self, id: ResourceId) -> reliquary_core::Result<Option<ResourceRecord>> {
        let found = self.inner.find(id).await?;
        if let Some(record) = &found
            && self.contend.swap(false, Ordering::SeqCst)
        {
            self.inner
                .save(record.clone(), record.lock_token())
                .await?;
        }
        Ok(found)
    }

    async fn find_many(&self, ids: &[ResourceId]) -> reliquary_core::Result<Vec<ResourceRecord>> {
        self.inner.find_many(ids).await
    }

    async fn save(
        &self,
        record: ResourceRecord,
        expected: Option<LockToken>,
    ) -> reliquary_core::Result<ResourceRecord> {
        self.inner.save(record, expected).await
    }

    async fn delete(&self, id: ResourceId) -> reliquary_core::Result<()> {
        self.inner.delete(id).await
    }

    async fn find_items_by_unique_identifier(
        &self,
        identifier: &str,
    ) -> reliquary_core::Result<Vec<Item>> {
        self.inner.find_items_by_unique_identifier(identifier).await
    }

    async fn find_items_referencing(
        &self,
        asset_id: ResourceId,
    ) -> reliquary_core::Result<Vec<Item>> {
        self.inner.find_items_referencing(asset_id).await
    }
}

#[tokio::test]
async fn create_asset_records_actor_without_a_file() {
    let harness = Harness::new();
    let asset = harness.metadata_only_asset("front.tif").await;

    assert_eq!(asset.created_by.as_deref(), Some(ACTOR));
    assert_eq!(asset.updated_by.as_deref(), Some(ACTOR));
    assert!(asset.preservation_file_id.is_none());
    assert!(asset.preservation_events.is_empty());
    assert!(asset.lock_token().is_some());
    assert!(harness.stack.repository.contains(asset.id).await);
}

#[tokio::test]
async fn create_asset_requires_an_actor() {
    let harness = Harness::new();
    let failure = harness
        .transactions()
        .create_asset(
            AssetAttributes {
                original_filename: Some("front.tif".into()),
                ..Default::default()
            },
            "  ",
        )
        .await
        .unwrap_err();

    assert_eq!(failure.code, FailureCode::MissingUpdatedBy);
    assert!(harness.stack.repository.is_empty().await);
}

#[tokio::test]
async fn create_asset_reports_field_errors_with_the_change_set() {
    let harness = Harness::new();
    let failure = harness
        .transactions()
        .create_asset(AssetAttributes::default(), ACTOR)
        .await
        .unwrap_err();

    assert_eq!(failure.code, FailureCode::ValidationFailed);
    assert_eq!(failure.class(), FailureClass::Input);
    assert!(
        failure
            .field_errors
            .iter()
            .any(|error| error.field == "original_filename")
    );
    assert!(failure.change_set.is_some());
}

#[tokio::test]
async fn attaching_a_file_ingests_it_with_one_event_timestamp() {
    let harness = Harness::new();
    let content = tiff("front");
    let asset = harness.asset_with_file("front.tif", content.clone()).await;

    let expected = sha256_hex(&content);
    assert_eq!(asset.sha256(), Some(expected.as_str()));
    assert_eq!(
        asset.technical_metadata.mime_type.as_deref(),
        Some("image/tiff")
    );
    assert_eq!(asset.technical_metadata.size, Some(content.len() as u64));

    let kinds: Vec<_> = asset.preservation_events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            PreservationEventType::VirusCheck,
            PreservationEventType::Ingestion,
            PreservationEventType::MessageDigestCalculation,
            PreservationEventType::FilenameChange,
        ]
    );
    let stamps: HashSet<_> = asset.preservation_events.iter().map(|e| e.timestamp).collect();
    assert_eq!(stamps.len(), 1);

    let file_id = asset.preservation_file_id.clone().unwrap();
    assert!(harness.stack.blobs.contains(&file_id).await);

    let pending = harness.stack.jobs.pending_payloads().await;
    assert!(pending.contains(&JobPayload::GenerateDerivatives { asset_id: asset.id }));
    assert!(pending.contains(&JobPayload::PreservationBackup { asset_id: asset.id }));
}

#[tokio::test]
async fn same_bytes_keep_the_checksum_and_new_bytes_mark_derivatives_stale() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    harness.drain_jobs().await;

    let with_derivatives = harness.asset(asset.id).await.unwrap();
    assert!(!with_derivatives.derivatives.is_empty());
    assert!(with_derivatives.derivatives.iter().all(|d| !d.stale));

    let again = harness
        .transactions()
        .update_asset(
            asset.id,
            AssetAttributes::default(),
            Some(ACTOR.into()),
            Some(FileUpload::new("front.tif", tiff("front"))),
        )
        .await
        .unwrap();
    assert_eq!(again.sha256(), asset.sha256());

    let replaced = harness
        .transactions()
        .update_asset(
            asset.id,
            AssetAttributes::default(),
            Some(ACTOR.into()),
            Some(FileUpload::new("front.tif", tiff("front, rescanned"))),
        )
        .await
        .unwrap();
    assert_ne!(replaced.sha256(), asset.sha256());
    assert!(!replaced.derivatives.is_empty());
    assert!(replaced.derivatives.iter().all(|d| d.stale));
    assert!(
        replaced
            .preservation_events
            .iter()
            .any(|e| e.event_type == PreservationEventType::Reingestion)
    );
}

#[tokio::test]
async fn unchanged_metadata_update_writes_no_blobs_and_no_checksum_event() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    let uploads = harness.stack.blobs.upload_count();

    let updated = harness
        .transactions()
        .update_asset(
            asset.id,
            AssetAttributes {
                label: asset.label.clone(),
                annotations: Some(asset.annotations.clone()),
                ..Default::default()
            },
            Some(ACTOR.into()),
            None,
        )
        .await
        .unwrap();

    assert_eq!(harness.stack.blobs.upload_count(), uploads);
    assert_eq!(updated.preservation_events, asset.preservation_events);
}

#[tokio::test]
async fn label_change_records_a_metadata_event() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;

    let updated = harness
        .transactions()
        .update_asset(
            asset.id,
            AssetAttributes {
                label: Some("Recto".into()),
                ..Default::default()
            },
            Some(ACTOR.into()),
            None,
        )
        .await
        .unwrap();

    let last = updated.preservation_events.last().unwrap();
    assert_eq!(last.event_type, PreservationEventType::MetadataModification);
    assert_eq!(last.note, "Metadata updated: label");
    assert_eq!(
        updated
            .preservation_events
            .iter()
            .filter(|e| e.event_type == PreservationEventType::MessageDigestCalculation)
            .count(),
        1
    );
}

#[tokio::test]
async fn infected_upload_is_refused_before_anything_is_stored() {
    let harness = Harness::new();
    let asset = harness.metadata_only_asset("front.tif").await;

    let failure = harness
        .transactions()
        .update_asset(
            asset.id,
            AssetAttributes::default(),
            Some(ACTOR.into()),
            Some(FileUpload::new("front.tif", EICAR_SIGNATURE.to_vec())),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.code, FailureCode::VirusDetected);
    assert!(harness.stack.blobs.is_empty().await);
    assert_eq!(harness.asset(asset.id).await.unwrap(), asset);
}

#[tokio::test]
async fn update_without_actor_is_refused() {
    let harness = Harness::new();
    let asset = harness.metadata_only_asset("front.tif").await;

    let failure = harness
        .transactions()
        .update_asset(asset.id, AssetAttributes::default(), None, None)
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::MissingUpdatedBy);
}

#[tokio::test]
async fn unavailable_store_is_a_retryable_failure() {
    let harness = Harness::new();
    let asset = harness.metadata_only_asset("front.tif").await;
    harness.stack.repository.set_offline(true);

    let failure = harness
        .transactions()
        .update_asset(asset.id, AssetAttributes::default(), Some(ACTOR.into()), None)
        .await
        .unwrap_err();

    assert_eq!(failure.code, FailureCode::ErrorLoadingResource);
    assert!(failure.is_retryable());
}

#[tokio::test]
async fn upload_is_removed_again_when_the_save_fails() {
    let harness = Harness::new();
    let asset = harness.metadata_only_asset("front.tif").await;

    // An empty annotation fails validation after the file was uploaded.
    let failure = harness
        .transactions()
        .update_asset(
            asset.id,
            AssetAttributes {
                annotations: Some(vec![" ".into()]),
                ..Default::default()
            },
            Some(ACTOR.into()),
            Some(FileUpload::new("front.tif", tiff("front"))),
        )
        .await
        .unwrap_err();

    assert_eq!(failure.code, FailureCode::ValidationFailed);
    assert_eq!(harness.stack.blobs.upload_count(), 1);
    assert!(harness.stack.blobs.is_empty().await);
}

#[tokio::test]
async fn generate_derivatives_omits_declined_types() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;

    let generated = harness
        .transactions()
        .generate_derivatives(asset.id, None)
        .await
        .unwrap();

    let kinds: HashSet<_> = generated.derivatives.iter().map(|d| d.kind).collect();
    assert!(kinds.contains(&DerivativeType::Thumbnail));
    assert!(kinds.contains(&DerivativeType::Access));
    assert!(!kinds.contains(&DerivativeType::Hocr));
    assert_eq!(generated.updated_by.as_deref(), Some("reliquary-system"));
    for derivative in &generated.derivatives {
        assert!(harness.stack.blobs.contains(&derivative.file_id).await);
    }
}

#[tokio::test]
async fn regenerating_after_a_new_file_deletes_replaced_derivatives() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    let first = harness
        .transactions()
        .generate_derivatives(asset.id, None)
        .await
        .unwrap();

    harness
        .transactions()
        .update_asset(
            asset.id,
            AssetAttributes::default(),
            Some(ACTOR.into()),
            Some(FileUpload::new("front.tif", tiff("front, rescanned"))),
        )
        .await
        .unwrap();
    let second = harness
        .transactions()
        .generate_derivatives(asset.id, None)
        .await
        .unwrap();

    assert!(second.derivatives.iter().all(|d| !d.stale));
    for old in &first.derivatives {
        assert!(!harness.stack.blobs.contains(&old.file_id).await);
    }
}

#[tokio::test]
async fn generate_derivatives_requires_a_preservation_file() {
    let harness = Harness::new();
    let asset = harness.metadata_only_asset("front.tif").await;

    let failure = harness
        .transactions()
        .generate_derivatives(asset.id, None)
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::MissingPreservationFile);
}

#[tokio::test]
async fn deleting_the_sole_thumbnail_asset_clears_the_thumbnail() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    let item = harness.item_with(&[asset.id], &[asset.id]).await;
    assert_eq!(item.thumbnail_asset_id, Some(asset.id));

    harness
        .transactions()
        .delete_asset(asset.id, Some(ACTOR.into()))
        .await
        .unwrap();

    let item = harness.item(item.id).await.unwrap();
    assert!(item.asset_ids.is_empty());
    assert_eq!(item.thumbnail_asset_id, None);
    assert!(harness.asset(asset.id).await.is_none());
    assert!(harness.stack.blobs.is_empty().await);
}

#[tokio::test]
async fn deleting_the_thumbnail_while_other_assets_remain_is_refused() {
    let harness = Harness::new();
    let front = harness.asset_with_file("front.tif", tiff("front")).await;
    let back = harness.asset_with_file("back.tif", tiff("back")).await;
    let item = harness.item_with(&[front.id, back.id], &[front.id]).await;

    let failure = harness
        .transactions()
        .delete_asset(front.id, Some(ACTOR.into()))
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::ThumbnailDeletionRefused);
    assert!(harness.asset(front.id).await.is_some());

    harness
        .transactions()
        .delete_asset(back.id, Some(ACTOR.into()))
        .await
        .unwrap();
    let item = harness.item(item.id).await.unwrap();
    assert_eq!(item.asset_ids, vec![front.id]);
}

#[tokio::test]
async fn deleting_a_missing_asset_is_not_found() {
    let harness = Harness::new();
    let failure = harness
        .transactions()
        .delete_asset(reliquary_core::model::ResourceId::new(), None)
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::ResourceNotFound);
}

#[tokio::test]
async fn concurrent_write_makes_the_save_retryable() {
    let stack = InMemoryStack::new();
    let repository = Arc::new(ContendedRepository {
        inner: stack.repository.clone(),
        contend: AtomicBool::new(false),
    });
    let mut collaborators = stack.collaborators();
    collaborators.repository = repository.clone();
    let reliquary = Reliquary::new(collaborators, PipelineConfig::default());

    let asset = reliquary
        .transactions()
        .create_asset(
            AssetAttributes {
                original_filename: Some("front.tif".into()),
                ..Default::default()
            },
            ACTOR,
        )
        .await
        .unwrap();

    repository.contend.store(true, Ordering::SeqCst);
    let failure = reliquary
        .transactions()
        .update_asset(
            asset.id,
            AssetAttributes {
                label: Some("Recto".into()),
                ..Default::default()
            },
            Some(ACTOR.into()),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(failure.code, FailureCode::ErrorSavingResource);
    assert!(failure.is_retryable());
    let attempted = failure.change_set.as_deref().and_then(ResourceRecord::as_asset);
    assert_eq!(attempted.and_then(|a| a.label.as_deref()), Some("Recto"));

    let stored = stack.repository.find(asset.id).await.unwrap().unwrap();
    assert_eq!(stored.as_asset().unwrap().label, None);

    reliquary
        .transactions()
        .update_asset(
            asset.id,
            AssetAttributes {
                label: Some("Recto".into()),
                ..Default::default()
            },
            Some(ACTOR.into()),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn oversized_file_is_recorded_as_not_scanned() {
    let config = PipelineConfig {
        virus_scan_max_bytes: 16,
        ..PipelineConfig::default()
    };
    let harness = Harness::with_config(InMemoryStack::new(), config);
    let content = tiff("a page well over the scan limit");
    let asset = harness.asset_with_file("front.tif", content).await;

    let first = &asset.preservation_events[0];
    assert_eq!(first.event_type, PreservationEventType::VirusCheck);
    assert_eq!(first.outcome, EventOutcome::Warning);
    assert!(first.note.contains("not scanned"));

    let stamps: HashSet<_> = asset.preservation_events.iter().map(|e| e.timestamp).collect();
    assert_eq!(stamps.len(), 1);
    assert!(asset.preservation_file_id.is_some());
}

#[tokio::test]
async fn migrated_file_is_classified_as_a_migration() {
    let harness = Harness::new();
    let asset = harness.metadata_only_asset("front.tif").await;

    let migrated = harness
        .transactions()
        .migrate_asset(
            asset.id,
            FileUpload::new("front.tif", tiff("front")),
            "Bulwark",
            Some(ACTOR.into()),
        )
        .await
        .unwrap();

    let kinds: Vec<_> = migrated.preservation_events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        kinds,
        vec![
            PreservationEventType::VirusCheck,
            PreservationEventType::Migration,
            PreservationEventType::MessageDigestCalculation,
            PreservationEventType::FilenameChange,
        ]
    );
    assert!(migrated.preservation_events[1].note.contains("Bulwark"));
}

#[tokio::test]
async fn no_op_update_enqueues_nothing_without_configured_derivatives() {
    let harness = Harness::new();
    let asset = harness
        .asset_with_file("notes.bin", b"field notes, unformatted".to_vec())
        .await;
    assert_eq!(
        asset.technical_metadata.mime_type.as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(
        harness.stack.jobs.pending_payloads().await,
        vec![JobPayload::PreservationBackup { asset_id: asset.id }]
    );
    harness.drain_jobs().await;

    harness
        .transactions()
        .update_asset(asset.id, AssetAttributes::default(), Some(ACTOR.into()), None)
        .await
        .unwrap();

    assert!(harness.stack.jobs.pending_payloads().await.is_empty());
    let stored = harness.asset(asset.id).await.unwrap();
    assert!(stored.derivatives.is_empty());
    assert_eq!(stored.preservation_copies_ids.len(), 1);
}

#[tokio::test]
async fn asset_referenced_by_two_items_is_not_deleted() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    let first = harness.item_with(&[asset.id], &[asset.id]).await;
    let second = harness.item_with(&[asset.id], &[asset.id]).await;

    let failure = harness
        .transactions()
        .delete_asset(asset.id, Some(ACTOR.into()))
        .await
        .unwrap_err();

    assert_eq!(failure.code, FailureCode::MultipleParentItemsFound);
    assert_eq!(failure.class(), FailureClass::Integrity);
    assert!(!failure.is_retryable());
    assert!(harness.asset(asset.id).await.is_some());
    for item in [first.id, second.id] {
        assert_eq!(harness.item(item).await.unwrap().asset_ids, vec![asset.id]);
    }
}

mod support;

use reliquary_core::jobs::{JobPayload, JobRecord};
use reliquary_core::model::{AssetAttributes, PreservationEventType};
use reliquary_core::{DispatchStatus, FailureCode, FileUpload};

use support::{ACTOR, Harness, tiff};

#[tokio::test]
async fn backup_copies_the_preservation_file_once() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;

    let backed_up = harness
        .transactions()
        .preservation_backup(asset.id, None)
        .await
        .unwrap();

    assert_eq!(backed_up.preservation_copies_ids.len(), 1);
    assert!(
        harness
            .stack
            .backups
            .contains(&backed_up.preservation_copies_ids[0])
            .await
    );
    let last = backed_up.preservation_events.last().unwrap();
    assert_eq!(last.event_type, PreservationEventType::Replication);
    assert_eq!(last.implementer, "reliquary-system");

    let failure = harness
        .transactions()
        .preservation_backup(asset.id, Some(ACTOR.into()))
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::FileBackupAlreadyPresent);
    assert!(!failure.is_retryable());
    assert_eq!(harness.stack.backups.len().await, 1);
}

#[tokio::test]
async fn repeated_backup_job_is_a_no_op() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    let job = JobRecord::new(JobPayload::PreservationBackup { asset_id: asset.id });

    assert_eq!(harness.reliquary.runner().run(&job).await, DispatchStatus::Success);
    assert_eq!(harness.reliquary.runner().run(&job).await, DispatchStatus::Success);
    assert_eq!(harness.stack.backups.len().await, 1);
}

#[tokio::test]
async fn replacing_the_file_retires_the_old_backup() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    let backed_up = harness
        .transactions()
        .preservation_backup(asset.id, None)
        .await
        .unwrap();
    let old_copy = backed_up.preservation_copies_ids[0].clone();

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

    assert!(replaced.preservation_copies_ids.is_empty());
    assert!(!harness.stack.backups.contains(&old_copy).await);
    assert!(
        harness
            .stack
            .jobs
            .pending_payloads()
            .await
            .contains(&JobPayload::PreservationBackup { asset_id: asset.id })
    );

    let again = harness
        .transactions()
        .preservation_backup(asset.id, None)
        .await
        .unwrap();
    assert_eq!(again.preservation_copies_ids.len(), 1);
    assert_ne!(again.preservation_copies_ids[0], old_copy);
}

#[tokio::test]
async fn backup_requires_a_preservation_file() {
    let harness = Harness::new();
    let asset = harness.metadata_only_asset("front.tif").await;

    let failure = harness
        .transactions()
        .preservation_backup(asset.id, None)
        .await
        .unwrap_err();
    assert_eq!(failure.code, FailureCode::MissingPreservationFile);
}

#[tokio::test]
async fn unavailable_backup_store_leaves_the_asset_untouched() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    harness.stack.backups.set_offline(true);

    let failure = harness
        .transactions()
        .preservation_backup(asset.id, None)
        .await
        .unwrap_err();

    assert_eq!(failure.code, FailureCode::ErrorUploadingFile);
    assert!(failure.is_retryable());
    let stored = harness.asset(asset.id).await.unwrap();
    assert!(stored.preservation_copies_ids.is_empty());
    assert_eq!(stored.lock_token, asset.lock_token);
}

mod support;

use std::time::Duration;

use reliquary_core::jobs::{JobPayload, JobRecord, JobState};
use reliquary_core::model::ResourceId;
use reliquary_core::{DispatchStatus, RetryConfig};

use support::{ACTOR, Harness, tiff};

#[tokio::test]
async fn transient_failure_is_retried_with_backoff() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    harness.stack.blobs.set_offline(true);

    let job = JobRecord::new(JobPayload::GenerateDerivatives { asset_id: asset.id });
    let status = harness.reliquary.runner().run(&job).await;

    let retry = RetryConfig::default();
    match status {
        DispatchStatus::Retry { delay, error } => {
            assert_eq!(delay, retry.backoff_for(1));
            assert!(error.starts_with("error_reading_file"));
        }
        other => panic!("expected retry, got {other:?}"),
    }
}

#[tokio::test]
async fn transient_failure_is_dead_lettered_after_the_last_attempt() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    harness.stack.blobs.set_offline(true);

    let mut job = JobRecord::new(JobPayload::GenerateDerivatives { asset_id: asset.id });
    job.attempts = RetryConfig::default().max_attempts - 1;
    let status = harness.reliquary.runner().run(&job).await;

    assert!(matches!(status, DispatchStatus::DeadLetter { .. }));
}

#[tokio::test]
async fn refusal_is_dead_lettered_without_retry() {
    let harness = Harness::new();
    let asset = harness.metadata_only_asset("front.tif").await;

    let job = JobRecord::new(JobPayload::GenerateDerivatives { asset_id: asset.id });
    let status = harness.reliquary.runner().run(&job).await;

    match status {
        DispatchStatus::DeadLetter { error } => {
            assert!(error.starts_with("missing_preservation_file"));
        }
        other => panic!("expected dead letter, got {other:?}"),
    }
}

#[tokio::test]
async fn jobs_for_missing_resources_complete() {
    let harness = Harness::new();
    let runner = harness.reliquary.runner();

    for payload in [
        JobPayload::DeleteAsset {
            asset_id: ResourceId::new(),
            deleted_by: Some(ACTOR.into()),
        },
        JobPayload::GenerateDerivatives {
            asset_id: ResourceId::new(),
        },
        JobPayload::GenerateItemDerivatives {
            item_id: ResourceId::new(),
        },
    ] {
        let status = runner.run(&JobRecord::new(payload)).await;
        assert_eq!(status, DispatchStatus::Success);
    }
}

#[tokio::test]
async fn deferred_job_waits_for_its_backoff() {
    let harness = Harness::new();
    let asset = harness.asset_with_file("front.tif", tiff("front")).await;
    harness.stack.blobs.set_offline(true);

    let outcomes = harness.stack.jobs.drain(harness.reliquary.runner()).await;
    assert!(outcomes.iter().all(|(_, status)| status.needs_retry()));

    let pending = harness.stack.jobs.pending().await;
    assert_eq!(pending.len(), 2);
    assert!(
        pending
            .iter()
            .all(|job| job.state == JobState::Deferred && job.attempts == 1)
    );
    assert!(harness.stack.jobs.ready().await.is_empty());

    harness.stack.blobs.set_offline(false);
    let retried = pending[0].clone();
    harness
        .stack
        .jobs
        .complete(retried.id, &DispatchStatus::Success)
        .await;
    assert_eq!(harness.stack.jobs.pending().await.len(), 1);
    assert!(harness.asset(asset.id).await.is_some());
}

#[tokio::test]
async fn bulk_import_job_for_an_unknown_record_is_dead_lettered() {
    let harness = Harness::new();
    let job = JobRecord::new(JobPayload::ProcessBulkImport {
        import_id: reliquary_core::model::ImportId::new(),
    });
    let status = harness.reliquary.runner().run(&job).await;
    assert!(matches!(status, DispatchStatus::DeadLetter { .. }));
}

#[test]
fn backoff_grows_until_the_cap() {
    let retry = RetryConfig {
        max_attempts: 10,
        backoff_base_ms: 100,
        backoff_max_ms: 1_000,
    };
    assert_eq!(retry.backoff_for(1), Duration::from_millis(100));
    assert_eq!(retry.backoff_for(3), Duration::from_millis(400));
    assert_eq!(retry.backoff_for(8), Duration::from_millis(1_000));
}

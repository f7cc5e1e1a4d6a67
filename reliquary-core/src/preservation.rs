//! Preservation event derivation.
//!
//! Given a staged asset change, decide what happened to the file and record
//! it as audit events. Every event appended by one transaction carries the
//! same timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reliquary_model::{Asset, AssetField, PreservationEvent, PreservationEventType};

use crate::change_set::ChangeSet;
use crate::error::Failure;
use crate::state::AssetState;
use crate::transaction::{Step, StepResult};

/// Placeholder used when a file had no previous name.
pub const UNKNOWN_FILENAME: &str = "(none)";

/// What a transaction did to an asset's preservation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    MetadataUpdate,
    Ingestion,
    Reingestion,
    Migration,
}

impl FileAction {
    pub fn classify(change_set: &ChangeSet<Asset>, migrated_from: Option<&str>) -> Self {
        if migrated_from.is_some() {
            FileAction::Migration
        } else if !change_set.is_changed(AssetField::PreservationFile) {
            FileAction::MetadataUpdate
        } else if change_set.original().preservation_file_id.is_none() {
            FileAction::Ingestion
        } else {
            FileAction::Reingestion
        }
    }
}

/// Inputs to [`derive_events`] that do not live on the change set.
#[derive(Debug, Clone, Default)]
pub struct EventContext<'a> {
    pub implementer: &'a str,
    pub migrated_from: Option<&'a str>,
    pub checksum: Option<&'a str>,
    pub preceding: &'a [PreservationEvent],
}

/// Events describing `change_set`, all stamped with `timestamp`.
pub fn derive_events(
    change_set: &ChangeSet<Asset>,
    context: &EventContext<'_>,
    timestamp: DateTime<Utc>,
) -> Vec<PreservationEvent> {
    let action = FileAction::classify(change_set, context.migrated_from);
    let original = change_set.original();
    let proposed = change_set.proposed();
    let who = context.implementer;

    let mut events: Vec<PreservationEvent> = context.preceding.to_vec();

    match action {
        FileAction::MetadataUpdate => {
            let changed: Vec<String> = [
                AssetField::OriginalFilename,
                AssetField::Label,
                AssetField::Annotations,
                AssetField::Transcriptions,
            ]
            .into_iter()
            .filter(|field| change_set.is_changed(*field))
            .map(|field| field.to_string())
            .collect();
            if !changed.is_empty() {
                events.push(PreservationEvent::success(
                    PreservationEventType::MetadataModification,
                    who,
                    format!("Metadata updated: {}", changed.join(", ")),
                ));
            }
        }
        FileAction::Ingestion => events.push(PreservationEvent::success(
            PreservationEventType::Ingestion,
            who,
            format!("Object ingested as {}", display_name(proposed)),
        )),
        FileAction::Reingestion => events.push(PreservationEvent::success(
            PreservationEventType::Reingestion,
            who,
            format!("Object reingested from {}", display_name(proposed)),
        )),
        FileAction::Migration => events.push(PreservationEvent::success(
            PreservationEventType::Migration,
            who,
            format!(
                "Object migrated from {} to Reliquary",
                context.migrated_from.unwrap_or(UNKNOWN_FILENAME)
            ),
        )),
    }

    if action != FileAction::MetadataUpdate {
        if let Some(checksum) = context.checksum.or(proposed.sha256()) {
            events.push(PreservationEvent::success(
                PreservationEventType::MessageDigestCalculation,
                who,
                format!("Calculated sha256 checksum: {checksum}"),
            ));
        }

        if let Some(stored) = &proposed.preservation_file_id {
            events.push(PreservationEvent::success(
                PreservationEventType::FilenameChange,
                who,
                format!("File renamed from {} to {stored}", display_name(proposed)),
            ));
        }
    }

    if action == FileAction::Reingestion && change_set.is_changed(AssetField::OriginalFilename) {
        events.push(PreservationEvent::success(
            PreservationEventType::FilenameChange,
            who,
            format!(
                "Original filename changed from {} to {}",
                display_name(original),
                display_name(proposed)
            ),
        ));
    }

    events
        .into_iter()
        .map(|event| event.at(timestamp))
        .collect()
}

fn display_name(asset: &Asset) -> &str {
    asset
        .original_filename
        .as_deref()
        .unwrap_or(UNKNOWN_FILENAME)
}

/// Append derived events to the staged asset.
#[derive(Debug)]
pub struct AddPreservationEvents;

#[async_trait]
impl Step<AssetState> for AddPreservationEvents {
    fn name(&self) -> &'static str {
        "add_preservation_events"
    }

    async fn call(&self, mut state: AssetState) -> StepResult<AssetState> {
        let timestamp = Utc::now();
        let implementer = state
            .updated_by
            .clone()
            .ok_or_else(|| Failure::internal("preservation events need an implementer"))?;
        let preceding = std::mem::take(&mut state.work.preceding_events);
        let change_set = state
            .change_set
            .as_mut()
            .ok_or_else(|| Failure::internal("no change set staged"))?;

        let events = derive_events(
            change_set,
            &EventContext {
                implementer: &implementer,
                migrated_from: state.work.migrated_from.as_deref(),
                checksum: state.work.checksum.as_deref(),
                preceding: &preceding,
            },
            timestamp,
        );
        change_set.stage().preservation_events.extend(events);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliquary_model::{BlobId, Resource, ResourceId};

    fn ingested_asset() -> Asset {
        let mut asset = Asset::blank(ResourceId::new());
        asset.original_filename = Some("front.tif".into());
        asset.preservation_file_id = Some(BlobId::new("preservation://a/1"));
        asset.technical_metadata.sha256 = Some("abc".into());
        asset
    }

    fn context(checksum: Option<&str>) -> EventContext<'_> {
        EventContext {
            implementer: "archivist@example.edu",
            checksum,
            ..Default::default()
        }
    }

    fn types(events: &[PreservationEvent]) -> Vec<PreservationEventType> {
        events.iter().map(|e| e.event_type).collect()
    }

    #[test]
    fn first_file_is_an_ingestion() {
        let mut cs = ChangeSet::for_existing({
            let mut asset = Asset::blank(ResourceId::new());
            asset.original_filename = Some("front.tif".into());
            asset
        });
        *cs.stage() = ingested_asset();

        let now = Utc::now();
        let events = derive_events(&cs, &context(Some("abc")), now);
        assert_eq!(
            types(&events),
            vec![
                PreservationEventType::Ingestion,
                PreservationEventType::MessageDigestCalculation,
                PreservationEventType::FilenameChange,
            ]
        );
        assert!(events.iter().all(|e| e.timestamp == now));
        assert_eq!(events[2].note, "File renamed from front.tif to preservation://a/1");
    }

    #[test]
    fn replacing_file_with_new_name_is_a_reingestion() {
        let mut cs = ChangeSet::for_existing(ingested_asset());
        {
            let asset = cs.stage();
            asset.original_filename = Some("front-v2.tif".into());
            asset.preservation_file_id = Some(BlobId::new("preservation://a/2"));
        }
        let events = derive_events(&cs, &context(Some("def")), Utc::now());
        assert_eq!(
            types(&events),
            vec![
                PreservationEventType::Reingestion,
                PreservationEventType::MessageDigestCalculation,
                PreservationEventType::FilenameChange,
                PreservationEventType::FilenameChange,
            ]
        );
        assert_eq!(
            events[3].note,
            "Original filename changed from front.tif to front-v2.tif"
        );
    }

    #[test]
    fn metadata_update_without_changes_adds_nothing() {
        let cs = ChangeSet::for_existing(ingested_asset());
        assert!(derive_events(&cs, &context(None), Utc::now()).is_empty());
    }

    #[test]
    fn label_change_is_a_metadata_modification() {
        let mut cs = ChangeSet::for_existing(ingested_asset());
        cs.stage().label = Some("Front".into());
        let events = derive_events(&cs, &context(None), Utc::now());
        assert_eq!(types(&events), vec![PreservationEventType::MetadataModification]);
        assert_eq!(events[0].note, "Metadata updated: label");
    }

    #[test]
    fn migration_overrides_classification_and_keeps_preceding_events() {
        let cs = ChangeSet::for_existing(ingested_asset());
        let preceding = vec![PreservationEvent::success(
            PreservationEventType::VirusCheck,
            "archivist@example.edu",
            "File scanned, no virus found",
        )];
        let now = Utc::now();
        let events = derive_events(
            &cs,
            &EventContext {
                implementer: "archivist@example.edu",
                migrated_from: Some("Bulwark"),
                checksum: None,
                preceding: &preceding,
            },
            now,
        );
        assert_eq!(
            types(&events),
            vec![
                PreservationEventType::VirusCheck,
                PreservationEventType::Migration,
                PreservationEventType::MessageDigestCalculation,
                PreservationEventType::FilenameChange,
            ]
        );
        assert!(events.iter().all(|e| e.timestamp == now));
    }
}

use std::fmt;

use chrono::{DateTime, Utc};

/// Preservation actions recorded in an asset's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PreservationEventType {
    Ingestion,
    Reingestion,
    Migration,
    MetadataModification,
    MessageDigestCalculation,
    FilenameChange,
    VirusCheck,
    Replication,
}

impl PreservationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreservationEventType::Ingestion => "ingestion",
            PreservationEventType::Reingestion => "reingestion",
            PreservationEventType::Migration => "migration",
            PreservationEventType::MetadataModification => "metadata_modification",
            PreservationEventType::MessageDigestCalculation => {
                "message_digest_calculation"
            }
            PreservationEventType::FilenameChange => "filename_change",
            PreservationEventType::VirusCheck => "virus_check",
            PreservationEventType::Replication => "replication",
        }
    }
}

impl fmt::Display for PreservationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EventOutcome {
    Success,
    Failure,
    Warning,
}

/// Immutable audit entry. Once appended to an asset it is never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PreservationEvent {
    pub event_type: PreservationEventType,
    pub timestamp: DateTime<Utc>,
    pub implementer: String,
    pub outcome: EventOutcome,
    pub note: String,
}

impl PreservationEvent {
    pub fn success(
        event_type: PreservationEventType,
        implementer: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self::new(event_type, EventOutcome::Success, implementer, note)
    }

    pub fn warning(
        event_type: PreservationEventType,
        implementer: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self::new(event_type, EventOutcome::Warning, implementer, note)
    }

    /// Timestamp is provisional; the event deriver re-stamps every event it
    /// appends so that one transaction shares one instant.
    fn new(
        event_type: PreservationEventType,
        outcome: EventOutcome,
        implementer: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            implementer: implementer.into(),
            outcome,
            note: note.into(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

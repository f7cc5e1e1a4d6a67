use std::fmt;

use chrono::{DateTime, Utc};
use reliquary_model::{ImportId, ResourceId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for background jobs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Queue-visible job states.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum JobState {
    Ready,
    Deferred,
    Completed,
    DeadLetter,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    GenerateDerivatives,
    PreservationBackup,
    DeleteAsset,
    GenerateItemDerivatives,
    ProcessBulkImport,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::GenerateDerivatives => write!(f, "generate_derivatives"),
            JobKind::PreservationBackup => write!(f, "preservation_backup"),
            JobKind::DeleteAsset => write!(f, "delete_asset"),
            JobKind::GenerateItemDerivatives => write!(f, "generate_item_derivatives"),
            JobKind::ProcessBulkImport => write!(f, "process_bulk_import"),
        }
    }
}

/// Work requested by a transaction side effect or the import service.
///
/// Delivery is at-least-once, so every handler re-reads current state
/// instead of trusting the payload to still describe it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum JobPayload {
    GenerateDerivatives {
        asset_id: ResourceId,
    },
    PreservationBackup {
        asset_id: ResourceId,
    },
    DeleteAsset {
        asset_id: ResourceId,
        deleted_by: Option<String>,
    },
    GenerateItemDerivatives {
        item_id: ResourceId,
    },
    ProcessBulkImport {
        import_id: ImportId,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::GenerateDerivatives { .. } => JobKind::GenerateDerivatives,
            JobPayload::PreservationBackup { .. } => JobKind::PreservationBackup,
            JobPayload::DeleteAsset { .. } => JobKind::DeleteAsset,
            JobPayload::GenerateItemDerivatives { .. } => JobKind::GenerateItemDerivatives,
            JobPayload::ProcessBulkImport { .. } => JobKind::ProcessBulkImport,
        }
    }

    /// Two pending payloads with the same key describe the same work.
    pub fn dedupe_key(&self) -> String {
        match self {
            JobPayload::GenerateDerivatives { asset_id }
            | JobPayload::PreservationBackup { asset_id }
            | JobPayload::DeleteAsset { asset_id, .. } => {
                format!("{}:{asset_id}", self.kind())
            }
            JobPayload::GenerateItemDerivatives { item_id } => {
                format!("{}:{item_id}", self.kind())
            }
            JobPayload::ProcessBulkImport { import_id } => {
                format!("{}:{import_id}", self.kind())
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub payload: JobPayload,
    pub state: JobState,
    pub attempts: u16,
    pub available_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub dedupe_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(payload: JobPayload) -> Self {
        let now = Utc::now();
        let dedupe_key = payload.dedupe_key();
        Self {
            id: JobId::new(),
            payload,
            state: JobState::Ready,
            attempts: 0,
            available_at: now,
            last_error: None,
            dedupe_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, JobState::Ready | JobState::Deferred)
    }
}

/// Result of an enqueue call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: JobId,
    pub dedupe_key: String,
    pub accepted: bool,
    pub merged_into: Option<JobId>,
}

impl JobHandle {
    pub fn accepted(job_id: JobId, payload: &JobPayload) -> Self {
        Self {
            job_id,
            dedupe_key: payload.dedupe_key(),
            accepted: true,
            merged_into: None,
        }
    }

    pub fn merged(existing: JobId, payload: &JobPayload) -> Self {
        Self {
            job_id: existing,
            dedupe_key: payload.dedupe_key(),
            accepted: false,
            merged_into: Some(existing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_key_ignores_actor_on_delete() {
        let asset_id = ResourceId::new();
        let a = JobPayload::DeleteAsset {
            asset_id,
            deleted_by: Some("a@example.edu".into()),
        };
        let b = JobPayload::DeleteAsset {
            asset_id,
            deleted_by: None,
        };
        assert_eq!(a.dedupe_key(), b.dedupe_key());
        assert_ne!(
            a.dedupe_key(),
            JobPayload::PreservationBackup { asset_id }.dedupe_key()
        );
    }

    #[test]
    fn payload_serializes_with_kind_tag() {
        let asset_id = ResourceId::new();
        let value = serde_json::to_value(JobPayload::GenerateDerivatives { asset_id }).unwrap();
        assert_eq!(value["kind"], "generate_derivatives");
        assert_eq!(value["payload"]["asset_id"], asset_id.to_string());
    }
}

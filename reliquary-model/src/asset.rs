use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::derivative::{DerivativeRecord, DerivativeType};
use crate::error::{FieldError, is_blank};
use crate::event::PreservationEvent;
use crate::ids::{BlobId, LockToken, ResourceId};
use crate::metadata::TechnicalMetadata;
use crate::resource::{Resource, ResourceKind, ResourceRecord};

/// A single digital file together with its derivatives and audit trail.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Asset {
    pub id: ResourceId,
    pub lock_token: Option<LockToken>,
    pub original_filename: Option<String>,
    pub preservation_file_id: Option<BlobId>,
    pub preservation_copies_ids: Vec<BlobId>,
    pub technical_metadata: TechnicalMetadata,
    pub derivatives: Vec<DerivativeRecord>,
    pub preservation_events: Vec<PreservationEvent>,
    pub label: Option<String>,
    pub annotations: Vec<String>,
    pub transcriptions: Vec<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Asset {
    pub fn derivative(&self, kind: DerivativeType) -> Option<&DerivativeRecord> {
        self.derivatives.iter().find(|d| d.kind == kind)
    }

    /// True when derivatives should be (re)generated for this asset.
    ///
    /// `configured` are the types generated for its mime family. With none
    /// configured there is nothing to generate; otherwise any stale record,
    /// or no records at all, calls for a run. Types the generator declined
    /// are not counted as missing.
    pub fn needs_derivatives(&self, configured: &[DerivativeType]) -> bool {
        if self.preservation_file_id.is_none() || configured.is_empty() {
            return false;
        }
        self.derivatives.is_empty() || self.derivatives.iter().any(|d| d.stale)
    }

    /// True when the preservation file exists but has no backup copy.
    pub fn needs_backup(&self) -> bool {
        self.preservation_file_id.is_some() && self.preservation_copies_ids.is_empty()
    }

    pub fn sha256(&self) -> Option<&str> {
        self.technical_metadata.sha256.as_deref()
    }

    /// Every blob this asset owns in the primary blob store.
    pub fn primary_blob_ids(&self) -> Vec<BlobId> {
        self.preservation_file_id
            .iter()
            .cloned()
            .chain(self.derivatives.iter().map(|d| d.file_id.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssetAttributes {
    pub original_filename: Option<String>,
    /// `Some("")` clears the label.
    pub label: Option<String>,
    pub annotations: Option<Vec<String>>,
    pub transcriptions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetField {
    OriginalFilename,
    PreservationFile,
    PreservationCopies,
    TechnicalMetadata,
    Derivatives,
    PreservationEvents,
    Label,
    Annotations,
    Transcriptions,
}

impl fmt::Display for AssetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssetField::OriginalFilename => "original_filename",
            AssetField::PreservationFile => "preservation_file_id",
            AssetField::PreservationCopies => "preservation_copies_ids",
            AssetField::TechnicalMetadata => "technical_metadata",
            AssetField::Derivatives => "derivatives",
            AssetField::PreservationEvents => "preservation_events",
            AssetField::Label => "label",
            AssetField::Annotations => "annotations",
            AssetField::Transcriptions => "transcriptions",
        };
        f.write_str(name)
    }
}

impl Resource for Asset {
    type Attributes = AssetAttributes;
    type Field = AssetField;

    const KIND: ResourceKind = ResourceKind::Asset;
    const FIELDS: &'static [AssetField] = &[
        AssetField::OriginalFilename,
        AssetField::PreservationFile,
        AssetField::PreservationCopies,
        AssetField::TechnicalMetadata,
        AssetField::Derivatives,
        AssetField::PreservationEvents,
        AssetField::Label,
        AssetField::Annotations,
        AssetField::Transcriptions,
    ];

    fn blank(id: ResourceId) -> Self {
        Asset {
            id,
            lock_token: None,
            original_filename: None,
            preservation_file_id: None,
            preservation_copies_ids: Vec::new(),
            technical_metadata: TechnicalMetadata::default(),
            derivatives: Vec::new(),
            preservation_events: Vec::new(),
            label: None,
            annotations: Vec::new(),
            transcriptions: Vec::new(),
            created_by: None,
            updated_by: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn id(&self) -> ResourceId {
        self.id
    }

    fn lock_token(&self) -> Option<LockToken> {
        self.lock_token
    }

    fn set_lock_token(&mut self, token: LockToken) {
        self.lock_token = Some(token);
    }

    fn apply(&mut self, attributes: &AssetAttributes) {
        if let Some(filename) = &attributes.original_filename {
            self.original_filename = Some(filename.trim().to_string());
        }
        if let Some(label) = &attributes.label {
            let label = label.trim();
            self.label = (!label.is_empty()).then(|| label.to_string());
        }
        if let Some(annotations) = &attributes.annotations {
            self.annotations = annotations.clone();
        }
        if let Some(transcriptions) = &attributes.transcriptions {
            self.transcriptions = transcriptions.clone();
        }
    }

    fn differs(&self, other: &Self, field: AssetField) -> bool {
        match field {
            AssetField::OriginalFilename => self.original_filename != other.original_filename,
            AssetField::PreservationFile => {
                self.preservation_file_id != other.preservation_file_id
            }
            AssetField::PreservationCopies => {
                self.preservation_copies_ids != other.preservation_copies_ids
            }
            AssetField::TechnicalMetadata => {
                self.technical_metadata != other.technical_metadata
            }
            AssetField::Derivatives => self.derivatives != other.derivatives,
            AssetField::PreservationEvents => {
                self.preservation_events != other.preservation_events
            }
            AssetField::Label => self.label != other.label,
            AssetField::Annotations => self.annotations != other.annotations,
            AssetField::Transcriptions => self.transcriptions != other.transcriptions,
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if is_blank(self.original_filename.as_deref()) {
            errors.push(FieldError::blank("original_filename"));
        }
        if is_blank(self.created_by.as_deref()) {
            errors.push(FieldError::blank("created_by"));
        }
        if is_blank(self.updated_by.as_deref()) {
            errors.push(FieldError::blank("updated_by"));
        }

        if self.preservation_file_id.is_some() {
            if is_blank(self.technical_metadata.sha256.as_deref()) {
                errors.push(FieldError::new(
                    "technical_metadata.sha256",
                    "must be present when a preservation file is attached",
                ));
            }
            if is_blank(self.technical_metadata.mime_type.as_deref()) {
                errors.push(FieldError::new(
                    "technical_metadata.mime_type",
                    "must be present when a preservation file is attached",
                ));
            }
        } else if !self.preservation_copies_ids.is_empty() {
            errors.push(FieldError::new(
                "preservation_copies_ids",
                "must be empty without a preservation file",
            ));
        }

        let mut seen = HashSet::new();
        for derivative in &self.derivatives {
            if !seen.insert(derivative.kind) {
                errors.push(FieldError::new(
                    "derivatives",
                    format!("contains more than one {} derivative", derivative.kind),
                ));
            }
        }

        if self.annotations.iter().any(|a| a.trim().is_empty()) {
            errors.push(FieldError::new("annotations", "can't contain blank entries"));
        }
        if self.transcriptions.iter().any(|t| t.trim().is_empty()) {
            errors.push(FieldError::new(
                "transcriptions",
                "can't contain blank entries",
            ));
        }

        errors
    }

    fn assign_actor(&mut self, actor: &str, is_new: bool) {
        if is_new && self.created_by.is_none() {
            self.created_by = Some(actor.to_string());
        }
        self.updated_by = Some(actor.to_string());
    }

    fn touch(&mut self, at: DateTime<Utc>, is_new: bool) {
        if is_new {
            self.created_at = Some(at);
        }
        self.updated_at = Some(at);
    }

    fn into_record(self) -> ResourceRecord {
        ResourceRecord::Asset(self)
    }

    fn from_record(record: ResourceRecord) -> Option<Self> {
        match record {
            ResourceRecord::Asset(asset) => Some(asset),
            ResourceRecord::Item(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(filename: &str) -> Asset {
        let mut asset = Asset::blank(ResourceId::new());
        asset.apply(&AssetAttributes {
            original_filename: Some(filename.into()),
            ..Default::default()
        });
        asset.assign_actor("archivist@example.edu", true);
        asset
    }

    #[test]
    fn metadata_only_asset_is_valid() {
        assert!(named("front.tif").validate().is_empty());
    }

    #[test]
    fn attached_file_requires_checksum_and_mime() {
        let mut asset = named("front.tif");
        asset.preservation_file_id = Some(BlobId::new("preservation://x"));
        let fields: Vec<_> = asset.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"technical_metadata.sha256".to_string()));
        assert!(fields.contains(&"technical_metadata.mime_type".to_string()));
    }

    #[test]
    fn empty_label_clears_existing_label() {
        let mut asset = named("front.tif");
        asset.label = Some("Front".into());
        asset.apply(&AssetAttributes {
            label: Some("  ".into()),
            ..Default::default()
        });
        assert_eq!(asset.label, None);
    }

    #[test]
    fn needs_derivatives_when_any_is_stale() {
        let configured = [DerivativeType::Thumbnail, DerivativeType::Access];
        let mut asset = named("front.tif");
        assert!(!asset.needs_derivatives(&configured));

        asset.preservation_file_id = Some(BlobId::new("preservation://x"));
        assert!(asset.needs_derivatives(&configured));

        asset.derivatives.push(DerivativeRecord::fresh(
            DerivativeType::Thumbnail,
            "image/jpeg",
            BlobId::new("derivatives://t"),
            Utc::now(),
        ));
        assert!(!asset.needs_derivatives(&configured));

        asset.derivatives[0].stale = true;
        assert!(asset.needs_derivatives(&configured));
    }

    #[test]
    fn nothing_to_generate_without_configured_types() {
        let mut asset = named("notes.bin");
        asset.preservation_file_id = Some(BlobId::new("preservation://x"));
        assert!(!asset.needs_derivatives(&[]));
    }
}

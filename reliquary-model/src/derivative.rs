use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::ModelError;
use crate::ids::BlobId;

/// Kinds of derived artifacts produced from a preservation file or item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DerivativeType {
    Thumbnail,
    Access,
    TextonlyPdf,
    Text,
    Hocr,
    IiifManifest,
    Pdf,
}

impl DerivativeType {
    pub const ALL: [DerivativeType; 7] = [
        DerivativeType::Thumbnail,
        DerivativeType::Access,
        DerivativeType::TextonlyPdf,
        DerivativeType::Text,
        DerivativeType::Hocr,
        DerivativeType::IiifManifest,
        DerivativeType::Pdf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DerivativeType::Thumbnail => "thumbnail",
            DerivativeType::Access => "access",
            DerivativeType::TextonlyPdf => "textonly_pdf",
            DerivativeType::Text => "text",
            DerivativeType::Hocr => "hocr",
            DerivativeType::IiifManifest => "iiif_manifest",
            DerivativeType::Pdf => "pdf",
        }
    }

    /// Mime type of the artifact produced for a source of `source_mime`.
    pub fn output_mime(&self, source_mime: &str) -> &'static str {
        match self {
            DerivativeType::Thumbnail => "image/jpeg",
            DerivativeType::Access => match source_mime.split('/').next() {
                Some("audio") => "audio/mpeg",
                Some("video") => "video/mp4",
                _ => "image/tiff",
            },
            DerivativeType::TextonlyPdf | DerivativeType::Pdf => "application/pdf",
            DerivativeType::Text => "text/plain",
            DerivativeType::Hocr => "text/html",
            DerivativeType::IiifManifest => "application/json",
        }
    }

    /// Item-level derivatives are built from many assets rather than one file.
    pub fn is_item_level(&self) -> bool {
        matches!(self, DerivativeType::IiifManifest | DerivativeType::Pdf)
    }
}

impl fmt::Display for DerivativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DerivativeType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| ModelError::UnknownValue {
                kind: "derivative type",
                value: s.to_string(),
            })
    }
}

/// A derived file owned by an asset or item.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DerivativeRecord {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: DerivativeType,
    pub mime_type: String,
    pub file_id: BlobId,
    pub generated_at: DateTime<Utc>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stale: bool,
}

impl DerivativeRecord {
    pub fn fresh(
        kind: DerivativeType,
        mime_type: impl Into<String>,
        file_id: BlobId,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            mime_type: mime_type.into(),
            file_id,
            generated_at,
            stale: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mime_follows_source_family() {
        assert_eq!(DerivativeType::Access.output_mime("audio/x-wav"), "audio/mpeg");
        assert_eq!(DerivativeType::Access.output_mime("video/quicktime"), "video/mp4");
        assert_eq!(DerivativeType::Access.output_mime("image/tiff"), "image/tiff");
    }

    #[test]
    fn derivative_record_serializes_kind_as_type() {
        let record = DerivativeRecord::fresh(
            DerivativeType::Thumbnail,
            "image/jpeg",
            BlobId::new("derivatives://a/thumbnail"),
            Utc::now(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "thumbnail");
        assert_eq!(json["stale"], false);
    }
}

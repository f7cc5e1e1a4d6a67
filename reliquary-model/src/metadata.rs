use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;
use crate::ids::ResourceId;

/// Characterization output for a preservation file.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TechnicalMetadata {
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    /// Lowercase hex sha256 of the preservation file.
    pub sha256: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_seconds: Option<f64>,
}

impl TechnicalMetadata {
    pub fn is_empty(&self) -> bool {
        *self == TechnicalMetadata::default()
    }

    /// Top-level media family (`image`, `audio`, ...) of the mime type.
    pub fn mime_family(&self) -> Option<&str> {
        self.mime_type
            .as_deref()
            .and_then(|mime| mime.split('/').next())
    }
}

/// Free-form descriptive metadata keyed by field name.
///
/// Values are multi-valued; the ordering of values is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DescriptiveMetadata(pub BTreeMap<String, Vec<String>>);

impl DescriptiveMetadata {
    pub const TITLE: &'static str = "title";
    pub const BIBNUMBER: &'static str = "bibnumber";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, values: &[&str]) -> Self {
        self.insert(field, values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, values: Vec<String>) {
        self.0.insert(field.into(), values);
    }

    pub fn values(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.values(field).first().map(String::as_str)
    }

    /// True when the field has at least one non-blank value.
    pub fn has_value(&self, field: &str) -> bool {
        self.values(field).iter().any(|v| !v.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|values| values.is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// Arrangement and viewing hints for an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StructuralMetadata {
    pub arranged_asset_ids: Vec<ResourceId>,
    /// Raw value; checked against [`ViewingDirection`] during validation.
    pub viewing_direction: Option<String>,
    /// Raw value; checked against [`ViewingHint`] during validation.
    pub viewing_hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewingDirection {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

impl ViewingDirection {
    pub const ALL: [ViewingDirection; 4] = [
        ViewingDirection::LeftToRight,
        ViewingDirection::RightToLeft,
        ViewingDirection::TopToBottom,
        ViewingDirection::BottomToTop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewingDirection::LeftToRight => "left-to-right",
            ViewingDirection::RightToLeft => "right-to-left",
            ViewingDirection::TopToBottom => "top-to-bottom",
            ViewingDirection::BottomToTop => "bottom-to-top",
        }
    }
}

impl fmt::Display for ViewingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewingDirection {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| ModelError::UnknownValue {
                kind: "viewing direction",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewingHint {
    Individuals,
    Paged,
}

impl ViewingHint {
    pub const ALL: [ViewingHint; 2] = [ViewingHint::Individuals, ViewingHint::Paged];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewingHint::Individuals => "individuals",
            ViewingHint::Paged => "paged",
        }
    }
}

impl fmt::Display for ViewingHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewingHint {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| ModelError::UnknownValue {
                kind: "viewing hint",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewing_values_parse_from_their_wire_names() {
        assert_eq!(
            "right-to-left".parse::<ViewingDirection>().unwrap(),
            ViewingDirection::RightToLeft
        );
        assert_eq!("paged".parse::<ViewingHint>().unwrap(), ViewingHint::Paged);
        assert!("sideways".parse::<ViewingDirection>().is_err());
    }

    #[test]
    fn blank_values_do_not_count_as_present() {
        let metadata = DescriptiveMetadata::new().with("title", &["  "]);
        assert!(!metadata.has_value("title"));
        assert!(!metadata.has_value("subject"));
    }

    #[test]
    fn mime_family_is_the_primary_type() {
        let tech = TechnicalMetadata {
            mime_type: Some("image/tiff".into()),
            ..Default::default()
        };
        assert_eq!(tech.mime_family(), Some("image"));
    }
}

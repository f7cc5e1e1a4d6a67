//! Declarative bulk import input.
//!
//! An [`ImportJobDescription`] names one item and the files that make up its
//! assets. It is consumed once by the bulk import orchestrator and never
//! persisted as a resource.

use std::collections::{BTreeMap, HashSet};

use crate::metadata::DescriptiveMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ImportAction {
    Create,
    Update,
}

/// One declared file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssetEntry {
    pub filename: String,
    pub label: Option<String>,
    pub annotations: Vec<String>,
    pub transcriptions: Vec<String>,
}

impl AssetEntry {
    pub fn named(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Files for an import, split by whether they take part in the arrangement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssetsDescription {
    /// Staging location the filenames are resolved against.
    pub storage: String,
    pub arranged: Vec<AssetEntry>,
    pub unarranged: Vec<AssetEntry>,
}

impl AssetsDescription {
    /// Every declared entry, sorted by filename.
    pub fn entries_by_filename(&self) -> Vec<&AssetEntry> {
        let mut entries: Vec<&AssetEntry> =
            self.arranged.iter().chain(self.unarranged.iter()).collect();
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        entries
    }

    pub fn filenames(&self) -> HashSet<&str> {
        self.arranged
            .iter()
            .chain(self.unarranged.iter())
            .map(|entry| entry.filename.as_str())
            .collect()
    }

    /// Filenames declared more than once across both lists.
    pub fn duplicate_filenames(&self) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for entry in self.arranged.iter().chain(self.unarranged.iter()) {
            *counts.entry(entry.filename.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.arranged.is_empty() && self.unarranged.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportJobDescription {
    pub action: ImportAction,
    pub imported_by: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub unique_identifier: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub human_readable_name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub metadata: DescriptiveMetadata,
    #[cfg_attr(feature = "serde", serde(default))]
    pub viewing_direction: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub viewing_hint: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub internal_notes: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub assets: Option<AssetsDescription>,
}

impl ImportJobDescription {
    pub fn create(imported_by: impl Into<String>) -> Self {
        Self::new(ImportAction::Create, imported_by)
    }

    pub fn update(imported_by: impl Into<String>, unique_identifier: impl Into<String>) -> Self {
        let mut description = Self::new(ImportAction::Update, imported_by);
        description.unique_identifier = Some(unique_identifier.into());
        description
    }

    fn new(action: ImportAction, imported_by: impl Into<String>) -> Self {
        Self {
            action,
            imported_by: Some(imported_by.into()),
            unique_identifier: None,
            human_readable_name: None,
            metadata: DescriptiveMetadata::default(),
            viewing_direction: None,
            viewing_hint: None,
            internal_notes: Vec::new(),
            assets: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_ordered_by_filename_across_lists() {
        let assets = AssetsDescription {
            storage: "sceti".into(),
            arranged: vec![AssetEntry::named("front.tif")],
            unarranged: vec![AssetEntry::named("back.tif")],
        };
        let names: Vec<_> = assets
            .entries_by_filename()
            .into_iter()
            .map(|e| e.filename.as_str())
            .collect();
        assert_eq!(names, vec!["back.tif", "front.tif"]);
    }

    #[test]
    fn duplicates_are_detected_across_lists() {
        let assets = AssetsDescription {
            storage: "sceti".into(),
            arranged: vec![AssetEntry::named("a.tif")],
            unarranged: vec![AssetEntry::named("a.tif"), AssetEntry::named("b.tif")],
        };
        assert_eq!(assets.duplicate_filenames(), vec!["a.tif".to_string()]);
    }

    #[test]
    fn description_deserializes_with_defaults() {
        let json = r#"{
            "action": "create",
            "imported_by": "importer@example.edu",
            "human_readable_name": "Letter",
            "metadata": {"title": ["Letter"]},
            "assets": {"storage": "sceti", "arranged": [{"filename": "front.tif"}]}
        }"#;
        let description: ImportJobDescription = serde_json::from_str(json).unwrap();
        assert_eq!(description.action, ImportAction::Create);
        assert_eq!(description.metadata.first("title"), Some("Letter"));
        assert_eq!(description.assets.unwrap().arranged.len(), 1);
    }
}

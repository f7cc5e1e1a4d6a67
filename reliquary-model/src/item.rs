use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::derivative::{DerivativeRecord, DerivativeType};
use crate::error::{FieldError, is_blank};
use crate::ids::{LockToken, ResourceId};
use crate::metadata::{DescriptiveMetadata, StructuralMetadata, ViewingDirection, ViewingHint};
use crate::resource::{Resource, ResourceKind, ResourceRecord};

/// Prefix every persistent identifier minted for an item carries.
pub const ARK_PREFIX: &str = "ark:/";

/// A described content object made of ordered assets.
///
/// Items reference assets by id only; assets are independently addressable
/// and deletable.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Item {
    pub id: ResourceId,
    pub lock_token: Option<LockToken>,
    pub unique_identifier: Option<String>,
    pub human_readable_name: Option<String>,
    pub descriptive_metadata: DescriptiveMetadata,
    pub structural_metadata: StructuralMetadata,
    pub asset_ids: Vec<ResourceId>,
    pub thumbnail_asset_id: Option<ResourceId>,
    pub published: bool,
    pub first_published_at: Option<DateTime<Utc>>,
    pub last_published_at: Option<DateTime<Utc>>,
    pub derivatives: Vec<DerivativeRecord>,
    pub internal_notes: Vec<String>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn arranged_asset_ids(&self) -> &[ResourceId] {
        &self.structural_metadata.arranged_asset_ids
    }

    pub fn unarranged_asset_ids(&self) -> Vec<ResourceId> {
        let arranged: HashSet<_> = self.arranged_asset_ids().iter().collect();
        self.asset_ids
            .iter()
            .filter(|id| !arranged.contains(id))
            .copied()
            .collect()
    }

    pub fn references(&self, asset_id: ResourceId) -> bool {
        self.asset_ids.contains(&asset_id)
    }

    pub fn derivative(&self, kind: DerivativeType) -> Option<&DerivativeRecord> {
        self.derivatives.iter().find(|d| d.kind == kind)
    }

    /// First arranged asset, else first asset, else none.
    pub fn default_thumbnail(&self) -> Option<ResourceId> {
        self.arranged_asset_ids()
            .first()
            .or_else(|| self.asset_ids.first())
            .copied()
    }

    /// Remove every reference to `asset_id`, clearing the thumbnail if it
    /// pointed at the removed asset.
    pub fn unlink_asset(&mut self, asset_id: ResourceId) {
        self.asset_ids.retain(|id| *id != asset_id);
        self.structural_metadata
            .arranged_asset_ids
            .retain(|id| *id != asset_id);
        if self.thumbnail_asset_id == Some(asset_id) {
            self.thumbnail_asset_id = None;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StructuralAttributes {
    pub arranged_asset_ids: Option<Vec<ResourceId>>,
    pub viewing_direction: Option<String>,
    pub viewing_hint: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ItemAttributes {
    pub unique_identifier: Option<String>,
    pub human_readable_name: Option<String>,
    pub descriptive_metadata: Option<DescriptiveMetadata>,
    pub structural_metadata: Option<StructuralAttributes>,
    pub asset_ids: Option<Vec<ResourceId>>,
    pub thumbnail_asset_id: Option<ResourceId>,
    pub published: Option<bool>,
    pub internal_notes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemField {
    UniqueIdentifier,
    HumanReadableName,
    DescriptiveMetadata,
    StructuralMetadata,
    AssetIds,
    ThumbnailAssetId,
    Published,
    Derivatives,
    InternalNotes,
}

impl fmt::Display for ItemField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemField::UniqueIdentifier => "unique_identifier",
            ItemField::HumanReadableName => "human_readable_name",
            ItemField::DescriptiveMetadata => "descriptive_metadata",
            ItemField::StructuralMetadata => "structural_metadata",
            ItemField::AssetIds => "asset_ids",
            ItemField::ThumbnailAssetId => "thumbnail_asset_id",
            ItemField::Published => "published",
            ItemField::Derivatives => "derivatives",
            ItemField::InternalNotes => "internal_notes",
        };
        f.write_str(name)
    }
}

fn dedup_preserving_order(ids: &[ResourceId]) -> Vec<ResourceId> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(**id)).copied().collect()
}

impl Resource for Item {
    type Attributes = ItemAttributes;
    type Field = ItemField;

    const KIND: ResourceKind = ResourceKind::Item;
    const FIELDS: &'static [ItemField] = &[
        ItemField::UniqueIdentifier,
        ItemField::HumanReadableName,
        ItemField::DescriptiveMetadata,
        ItemField::StructuralMetadata,
        ItemField::AssetIds,
        ItemField::ThumbnailAssetId,
        ItemField::Published,
        ItemField::Derivatives,
        ItemField::InternalNotes,
    ];

    fn blank(id: ResourceId) -> Self {
        Item {
            id,
            lock_token: None,
            unique_identifier: None,
            human_readable_name: None,
            descriptive_metadata: DescriptiveMetadata::default(),
            structural_metadata: StructuralMetadata::default(),
            asset_ids: Vec::new(),
            thumbnail_asset_id: None,
            published: false,
            first_published_at: None,
            last_published_at: None,
            derivatives: Vec::new(),
            internal_notes: Vec::new(),
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

    fn apply(&mut self, attributes: &ItemAttributes) {
        if let Some(identifier) = &attributes.unique_identifier {
            self.unique_identifier = Some(identifier.trim().to_string());
        }
        if let Some(name) = &attributes.human_readable_name {
            self.human_readable_name = Some(name.trim().to_string());
        }
        if let Some(metadata) = &attributes.descriptive_metadata {
            self.descriptive_metadata = metadata.clone();
        }
        if let Some(structural) = &attributes.structural_metadata {
            if let Some(arranged) = &structural.arranged_asset_ids {
                self.structural_metadata.arranged_asset_ids = arranged.clone();
            }
            if let Some(direction) = &structural.viewing_direction {
                self.structural_metadata.viewing_direction = Some(direction.clone());
            }
            if let Some(hint) = &structural.viewing_hint {
                self.structural_metadata.viewing_hint = Some(hint.clone());
            }
        }
        if let Some(asset_ids) = &attributes.asset_ids {
            self.asset_ids = dedup_preserving_order(asset_ids);
        }
        if let Some(thumbnail) = attributes.thumbnail_asset_id {
            self.thumbnail_asset_id = Some(thumbnail);
        }
        if let Some(published) = attributes.published {
            self.published = published;
        }
        if let Some(notes) = &attributes.internal_notes {
            self.internal_notes = notes.clone();
        }
    }

    fn differs(&self, other: &Self, field: ItemField) -> bool {
        match field {
            ItemField::UniqueIdentifier => self.unique_identifier != other.unique_identifier,
            ItemField::HumanReadableName => {
                self.human_readable_name != other.human_readable_name
            }
            ItemField::DescriptiveMetadata => {
                self.descriptive_metadata != other.descriptive_metadata
            }
            ItemField::StructuralMetadata => {
                self.structural_metadata != other.structural_metadata
            }
            ItemField::AssetIds => self.asset_ids != other.asset_ids,
            ItemField::ThumbnailAssetId => self.thumbnail_asset_id != other.thumbnail_asset_id,
            ItemField::Published => self.published != other.published,
            ItemField::Derivatives => self.derivatives != other.derivatives,
            ItemField::InternalNotes => self.internal_notes != other.internal_notes,
        }
    }

    fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if is_blank(self.human_readable_name.as_deref()) {
            errors.push(FieldError::blank("human_readable_name"));
        }
        if is_blank(self.created_by.as_deref()) {
            errors.push(FieldError::blank("created_by"));
        }
        if is_blank(self.updated_by.as_deref()) {
            errors.push(FieldError::blank("updated_by"));
        }
        if let Some(identifier) = &self.unique_identifier
            && !identifier.starts_with(ARK_PREFIX)
        {
            errors.push(FieldError::new(
                "unique_identifier",
                format!("must be an ark identifier starting with {ARK_PREFIX}"),
            ));
        }

        let metadata = &self.descriptive_metadata;
        if !metadata.has_value(DescriptiveMetadata::TITLE)
            && !metadata.has_value(DescriptiveMetadata::BIBNUMBER)
        {
            errors.push(FieldError::new(
                "descriptive_metadata.title",
                "can't be blank unless a bibnumber is provided",
            ));
        }

        let structural = &self.structural_metadata;
        if let Some(direction) = &structural.viewing_direction
            && direction.parse::<ViewingDirection>().is_err()
        {
            errors.push(FieldError::new(
                "structural_metadata.viewing_direction",
                format!("is not included in the list: {direction}"),
            ));
        }
        if let Some(hint) = &structural.viewing_hint
            && hint.parse::<ViewingHint>().is_err()
        {
            errors.push(FieldError::new(
                "structural_metadata.viewing_hint",
                format!("is not included in the list: {hint}"),
            ));
        }

        if dedup_preserving_order(&self.asset_ids).len() != self.asset_ids.len() {
            errors.push(FieldError::new("asset_ids", "can't contain duplicates"));
        }

        let members: HashSet<_> = self.asset_ids.iter().collect();
        let arranged = &structural.arranged_asset_ids;
        if arranged.iter().any(|id| !members.contains(id)) {
            errors.push(FieldError::new(
                "structural_metadata.arranged_asset_ids",
                "must be a subset of asset_ids",
            ));
        }
        if dedup_preserving_order(arranged).len() != arranged.len() {
            errors.push(FieldError::new(
                "structural_metadata.arranged_asset_ids",
                "can't contain duplicates",
            ));
        }

        if let Some(thumbnail) = &self.thumbnail_asset_id
            && !members.contains(thumbnail)
        {
            errors.push(FieldError::new(
                "thumbnail_asset_id",
                "must be included in asset_ids",
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
        ResourceRecord::Item(self)
    }

    fn from_record(record: ResourceRecord) -> Option<Self> {
        match record {
            ResourceRecord::Item(item) => Some(item),
            ResourceRecord::Asset(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled() -> Item {
        let mut item = Item::blank(ResourceId::new());
        item.apply(&ItemAttributes {
            human_readable_name: Some("Letter to Franklin".into()),
            descriptive_metadata: Some(DescriptiveMetadata::new().with("title", &["Letter"])),
            ..Default::default()
        });
        item.assign_actor("archivist@example.edu", true);
        item
    }

    fn messages(item: &Item) -> Vec<String> {
        item.validate().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn thumbnail_must_reference_a_member_asset() {
        let mut item = titled();
        item.thumbnail_asset_id = Some(ResourceId::new());
        assert_eq!(
            messages(&item),
            vec!["thumbnail_asset_id must be included in asset_ids"]
        );

        let asset = ResourceId::new();
        item.asset_ids = vec![asset];
        item.thumbnail_asset_id = Some(asset);
        assert!(item.validate().is_empty());
    }

    #[test]
    fn arranged_ids_must_be_subset_of_asset_ids() {
        let mut item = titled();
        item.structural_metadata.arranged_asset_ids = vec![ResourceId::new()];
        assert_eq!(
            messages(&item),
            vec!["structural_metadata.arranged_asset_ids must be a subset of asset_ids"]
        );
    }

    #[test]
    fn enumerated_structural_values_are_checked() {
        let mut item = titled();
        item.structural_metadata.viewing_direction = Some("sideways".into());
        item.structural_metadata.viewing_hint = Some("paged".into());
        assert_eq!(
            messages(&item),
            vec!["structural_metadata.viewing_direction is not included in the list: sideways"]
        );
    }

    #[test]
    fn bibnumber_substitutes_for_title() {
        let mut item = titled();
        item.descriptive_metadata = DescriptiveMetadata::new().with("bibnumber", &["9912345"]);
        assert!(item.validate().is_empty());
    }

    #[test]
    fn unlinking_the_thumbnail_clears_it() {
        let mut item = titled();
        let (a, b) = (ResourceId::new(), ResourceId::new());
        item.asset_ids = vec![a, b];
        item.structural_metadata.arranged_asset_ids = vec![a];
        item.thumbnail_asset_id = Some(a);

        item.unlink_asset(a);

        assert_eq!(item.asset_ids, vec![b]);
        assert!(item.arranged_asset_ids().is_empty());
        assert_eq!(item.thumbnail_asset_id, None);
    }

    #[test]
    fn default_thumbnail_prefers_arranged_assets() {
        let mut item = titled();
        let (a, b) = (ResourceId::new(), ResourceId::new());
        item.asset_ids = vec![a, b];
        assert_eq!(item.default_thumbnail(), Some(a));
        item.structural_metadata.arranged_asset_ids = vec![b];
        assert_eq!(item.default_thumbnail(), Some(b));
    }
}

use std::fmt;

use chrono::{DateTime, Utc};

use crate::asset::Asset;
use crate::error::FieldError;
use crate::ids::{LockToken, ResourceId};
use crate::item::Item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResourceKind {
    Item,
    Asset,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Item => f.write_str("item"),
            ResourceKind::Asset => f.write_str("asset"),
        }
    }
}

/// Capability set shared by items and assets.
///
/// Staging, validation and persistence are written once against this trait;
/// the concrete resource decides which fields exist, how raw attributes land
/// on it, and which invariants a valid instance satisfies.
pub trait Resource: Clone + fmt::Debug + Send + Sync + 'static {
    /// Raw, partially specified attribute set supplied by a caller.
    type Attributes: Clone + fmt::Debug + Default + Send + Sync + 'static;
    /// Fields tracked for change detection.
    type Field: Copy + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static;

    const KIND: ResourceKind;
    const FIELDS: &'static [Self::Field];

    /// An unsaved, empty resource carrying `id`.
    fn blank(id: ResourceId) -> Self;

    fn id(&self) -> ResourceId;

    /// `None` until the resource has been saved once.
    fn lock_token(&self) -> Option<LockToken>;

    fn set_lock_token(&mut self, token: LockToken);

    /// Apply caller attributes; fields left as `None` are untouched.
    fn apply(&mut self, attributes: &Self::Attributes);

    fn differs(&self, other: &Self, field: Self::Field) -> bool;

    fn validate(&self) -> Vec<FieldError>;

    /// Record who is responsible for this revision.
    fn assign_actor(&mut self, actor: &str, is_new: bool);

    /// Stamp persistence timestamps just before the write.
    fn touch(&mut self, at: DateTime<Utc>, is_new: bool);

    fn into_record(self) -> ResourceRecord;

    fn from_record(record: ResourceRecord) -> Option<Self>;
}

/// Tagged union of everything the repository store can hold.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum ResourceRecord {
    Item(Item),
    Asset(Asset),
}

impl ResourceRecord {
    pub fn id(&self) -> ResourceId {
        match self {
            ResourceRecord::Item(item) => item.id,
            ResourceRecord::Asset(asset) => asset.id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceRecord::Item(_) => ResourceKind::Item,
            ResourceRecord::Asset(_) => ResourceKind::Asset,
        }
    }

    pub fn lock_token(&self) -> Option<LockToken> {
        match self {
            ResourceRecord::Item(item) => item.lock_token,
            ResourceRecord::Asset(asset) => asset.lock_token,
        }
    }

    pub fn set_lock_token(&mut self, token: LockToken) {
        match self {
            ResourceRecord::Item(item) => item.lock_token = Some(token),
            ResourceRecord::Asset(asset) => asset.lock_token = Some(token),
        }
    }

    pub fn as_item(&self) -> Option<&Item> {
        match self {
            ResourceRecord::Item(item) => Some(item),
            ResourceRecord::Asset(_) => None,
        }
    }

    pub fn as_asset(&self) -> Option<&Asset> {
        match self {
            ResourceRecord::Asset(asset) => Some(asset),
            ResourceRecord::Item(_) => None,
        }
    }
}

impl From<Item> for ResourceRecord {
    fn from(item: Item) -> Self {
        ResourceRecord::Item(item)
    }
}

impl From<Asset> for ResourceRecord {
    fn from(asset: Asset) -> Self {
        ResourceRecord::Asset(asset)
    }
}

use reliquary_model::Item;

use crate::collaborators::Collaborators;
use crate::state::ItemState;
use crate::steps::files::{CleanupUploadsOnFailure, DeleteSupersededDerivatives};
use crate::steps::item::{
    BuildIiifManifest, EnqueueAssetDeletion, MintIdentifier, RefreshIdentifierMetadata,
    assign_default_thumbnail, collect_member_assets, stamp_publication,
};
use crate::steps::resource::{
    CreateChangeSet, DeleteResource, FindResource, SaveResource, require_updated_by, validate,
};
use crate::transaction::Transaction;

use super::TransactionName;

pub(super) fn create_item(c: &Collaborators) -> Transaction<ItemState> {
    Transaction::named(TransactionName::CreateItem.as_str())
        .step(CreateChangeSet)
        .pure("require_updated_by", require_updated_by::<Item, _>)
        .step(MintIdentifier::new(c.identifiers.clone()))
        .pure("assign_default_thumbnail", assign_default_thumbnail)
        .pure("stamp_publication", stamp_publication)
        .pure("validate", validate::<Item, _>)
        .step(SaveResource::new(c.repository.clone()))
        .side_effect(RefreshIdentifierMetadata::new(c.identifiers.clone()))
        .build()
}

pub(super) fn update_item(c: &Collaborators) -> Transaction<ItemState> {
    Transaction::named(TransactionName::UpdateItem.as_str())
        .step(FindResource::new(c.repository.clone()))
        .step(CreateChangeSet)
        .pure("require_updated_by", require_updated_by::<Item, _>)
        .pure("assign_default_thumbnail", assign_default_thumbnail)
        .pure("stamp_publication", stamp_publication)
        .pure("validate", validate::<Item, _>)
        .step(SaveResource::new(c.repository.clone()))
        .side_effect(RefreshIdentifierMetadata::new(c.identifiers.clone()))
        .build()
}

pub(super) fn delete_item(c: &Collaborators) -> Transaction<ItemState> {
    Transaction::named(TransactionName::DeleteItem.as_str())
        .step(FindResource::new(c.repository.clone()))
        .pure("collect_member_assets", collect_member_assets)
        .step(DeleteResource::new(c.repository.clone()))
        .side_effect(DeleteSupersededDerivatives::new(c.blobs.clone()))
        .side_effect(EnqueueAssetDeletion::new(c.jobs.clone()))
        .build()
}

pub(super) fn generate_item_derivatives(c: &Collaborators) -> Transaction<ItemState> {
    Transaction::named(TransactionName::GenerateItemDerivatives.as_str())
        .step(FindResource::new(c.repository.clone()))
        .step(CreateChangeSet)
        .around(CleanupUploadsOnFailure::new(c.blobs.clone()))
        .step(BuildIiifManifest::new(c.repository.clone(), c.blobs.clone()))
        .pure("validate", validate::<Item, _>)
        .step(SaveResource::new(c.repository.clone()))
        .side_effect(DeleteSupersededDerivatives::new(c.blobs.clone()))
        .build()
}

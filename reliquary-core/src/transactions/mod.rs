//! The concrete resource transactions and the table that names them.
//!
//! Every transaction is built once when [`ResourceTransactions`] is
//! constructed and looked up by [`TransactionName`] afterwards.

mod asset;
mod item;

use std::fmt;
use std::str::FromStr;

use reliquary_model::{
    Asset, AssetAttributes, Item, ItemAttributes, ModelError, ResourceId, ResourceKind,
};

use crate::collaborators::Collaborators;
use crate::config::PipelineConfig;
use crate::error::Failure;
use crate::state::{AssetState, FileUpload, ItemState};
use crate::transaction::{StepResult, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionName {
    CreateAsset,
    UpdateAsset,
    DeleteAsset,
    GenerateDerivatives,
    PreservationBackup,
    CreateItem,
    UpdateItem,
    DeleteItem,
    GenerateItemDerivatives,
}

impl TransactionName {
    pub const ALL: [TransactionName; 9] = [
        TransactionName::CreateAsset,
        TransactionName::UpdateAsset,
        TransactionName::DeleteAsset,
        TransactionName::GenerateDerivatives,
        TransactionName::PreservationBackup,
        TransactionName::CreateItem,
        TransactionName::UpdateItem,
        TransactionName::DeleteItem,
        TransactionName::GenerateItemDerivatives,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionName::CreateAsset => "create_asset",
            TransactionName::UpdateAsset => "update_asset",
            TransactionName::DeleteAsset => "delete_asset",
            TransactionName::GenerateDerivatives => "generate_derivatives",
            TransactionName::PreservationBackup => "preservation_backup",
            TransactionName::CreateItem => "create_item",
            TransactionName::UpdateItem => "update_item",
            TransactionName::DeleteItem => "delete_item",
            TransactionName::GenerateItemDerivatives => "generate_item_derivatives",
        }
    }

    /// Kind of resource the transaction operates on.
    pub fn kind(&self) -> ResourceKind {
        match self {
            TransactionName::CreateAsset
            | TransactionName::UpdateAsset
            | TransactionName::DeleteAsset
            | TransactionName::GenerateDerivatives
            | TransactionName::PreservationBackup => ResourceKind::Asset,
            TransactionName::CreateItem
            | TransactionName::UpdateItem
            | TransactionName::DeleteItem
            | TransactionName::GenerateItemDerivatives => ResourceKind::Item,
        }
    }
}

impl fmt::Display for TransactionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionName {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ModelError::UnknownValue {
                kind: "transaction",
                value: s.to_string(),
            })
    }
}

/// Static registry of every resource transaction.
pub struct ResourceTransactions {
    create_asset: Transaction<AssetState>,
    update_asset: Transaction<AssetState>,
    delete_asset: Transaction<AssetState>,
    generate_derivatives: Transaction<AssetState>,
    preservation_backup: Transaction<AssetState>,
    create_item: Transaction<ItemState>,
    update_item: Transaction<ItemState>,
    delete_item: Transaction<ItemState>,
    generate_item_derivatives: Transaction<ItemState>,
    system_actor: String,
}

impl ResourceTransactions {
    pub fn new(collaborators: &Collaborators, config: &PipelineConfig) -> Self {
        Self {
            create_asset: asset::create_asset(collaborators),
            update_asset: asset::update_asset(collaborators, config),
            delete_asset: asset::delete_asset(collaborators),
            generate_derivatives: asset::generate_derivatives(collaborators, config),
            preservation_backup: asset::preservation_backup(collaborators),
            create_item: item::create_item(collaborators),
            update_item: item::update_item(collaborators),
            delete_item: item::delete_item(collaborators),
            generate_item_derivatives: item::generate_item_derivatives(collaborators),
            system_actor: config.system_actor.clone(),
        }
    }

    pub fn asset(&self, name: TransactionName) -> Option<&Transaction<AssetState>> {
        match name {
            TransactionName::CreateAsset => Some(&self.create_asset),
            TransactionName::UpdateAsset => Some(&self.update_asset),
            TransactionName::DeleteAsset => Some(&self.delete_asset),
            TransactionName::GenerateDerivatives => Some(&self.generate_derivatives),
            TransactionName::PreservationBackup => Some(&self.preservation_backup),
            _ => None,
        }
    }

    pub fn item(&self, name: TransactionName) -> Option<&Transaction<ItemState>> {
        match name {
            TransactionName::CreateItem => Some(&self.create_item),
            TransactionName::UpdateItem => Some(&self.update_item),
            TransactionName::DeleteItem => Some(&self.delete_item),
            TransactionName::GenerateItemDerivatives => Some(&self.generate_item_derivatives),
            _ => None,
        }
    }

    /// Run an asset transaction by name.
    pub async fn call_asset(
        &self,
        name: TransactionName,
        state: AssetState,
    ) -> StepResult<AssetState> {
        let transaction = self
            .asset(name)
            .ok_or_else(|| Failure::internal(format!("{name} is not an asset transaction")))?;
        transaction.call(state).await
    }

    /// Run an item transaction by name.
    pub async fn call_item(&self, name: TransactionName, state: ItemState) -> StepResult<ItemState> {
        let transaction = self
            .item(name)
            .ok_or_else(|| Failure::internal(format!("{name} is not an item transaction")))?;
        transaction.call(state).await
    }

    pub fn system_actor(&self) -> &str {
        &self.system_actor
    }

    pub async fn create_asset(
        &self,
        attributes: AssetAttributes,
        created_by: impl Into<String>,
    ) -> Result<Asset, Failure> {
        let state = AssetState::for_new(attributes, Some(created_by.into()));
        saved(self.create_asset.call(state).await?)
    }

    /// Update metadata and, when `file` is given, attach a new preservation
    /// file.
    pub async fn update_asset(
        &self,
        id: ResourceId,
        attributes: AssetAttributes,
        updated_by: Option<String>,
        file: Option<FileUpload>,
    ) -> Result<Asset, Failure> {
        let mut state = AssetState::for_existing(id, attributes, updated_by);
        state.work.file = file;
        saved(self.update_asset.call(state).await?)
    }

    /// Attach a file carried over from another system. The ingest is
    /// recorded as a migration from `migrated_from`.
    pub async fn migrate_asset(
        &self,
        id: ResourceId,
        file: FileUpload,
        migrated_from: impl Into<String>,
        updated_by: Option<String>,
    ) -> Result<Asset, Failure> {
        let mut state = AssetState::for_existing(id, AssetAttributes::default(), updated_by);
        state.work.file = Some(file);
        state.work.migrated_from = Some(migrated_from.into());
        saved(self.update_asset.call(state).await?)
    }

    /// Returns the asset as it was before deletion.
    pub async fn delete_asset(
        &self,
        id: ResourceId,
        deleted_by: Option<String>,
    ) -> Result<Asset, Failure> {
        saved(self.delete_asset.call(AssetState::for_id(id, deleted_by)).await?)
    }

    pub async fn generate_derivatives(
        &self,
        id: ResourceId,
        requested_by: Option<String>,
    ) -> Result<Asset, Failure> {
        let actor = requested_by.unwrap_or_else(|| self.system_actor.clone());
        saved(
            self.generate_derivatives
                .call(AssetState::for_id(id, Some(actor)))
                .await?,
        )
    }

    pub async fn preservation_backup(
        &self,
        id: ResourceId,
        requested_by: Option<String>,
    ) -> Result<Asset, Failure> {
        let actor = requested_by.unwrap_or_else(|| self.system_actor.clone());
        saved(
            self.preservation_backup
                .call(AssetState::for_id(id, Some(actor)))
                .await?,
        )
    }

    pub async fn create_item(
        &self,
        attributes: ItemAttributes,
        created_by: impl Into<String>,
    ) -> Result<Item, Failure> {
        let state = ItemState::for_new(attributes, Some(created_by.into()));
        saved(self.create_item.call(state).await?)
    }

    pub async fn update_item(
        &self,
        id: ResourceId,
        attributes: ItemAttributes,
        updated_by: Option<String>,
    ) -> Result<Item, Failure> {
        let state = ItemState::for_existing(id, attributes, updated_by);
        saved(self.update_item.call(state).await?)
    }

    /// Member assets are deleted by background jobs afterwards.
    pub async fn delete_item(
        &self,
        id: ResourceId,
        deleted_by: Option<String>,
    ) -> Result<Item, Failure> {
        saved(self.delete_item.call(ItemState::for_id(id, deleted_by)).await?)
    }

    pub async fn generate_item_derivatives(
        &self,
        id: ResourceId,
        requested_by: Option<String>,
    ) -> Result<Item, Failure> {
        let actor = requested_by.unwrap_or_else(|| self.system_actor.clone());
        saved(
            self.generate_item_derivatives
                .call(ItemState::for_id(id, Some(actor)))
                .await?,
        )
    }
}

fn saved<R: reliquary_model::Resource, W>(
    state: crate::state::MutationState<R, W>,
) -> Result<R, Failure> {
    state
        .into_resource()
        .ok_or_else(|| Failure::internal("transaction finished without a resource"))
}

impl fmt::Debug for ResourceTransactions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceTransactions")
            .field("create_asset", &self.create_asset)
            .field("update_asset", &self.update_asset)
            .field("delete_asset", &self.delete_asset)
            .field("generate_derivatives", &self.generate_derivatives)
            .field("preservation_backup", &self.preservation_backup)
            .field("create_item", &self.create_item)
            .field("update_item", &self.update_item)
            .field("delete_item", &self.delete_item)
            .field("generate_item_derivatives", &self.generate_item_derivatives)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_know_their_kind() {
        for name in TransactionName::ALL {
            assert_eq!(name.as_str().parse::<TransactionName>().unwrap(), name);
        }
        assert_eq!(TransactionName::DeleteItem.kind(), ResourceKind::Item);
        assert!("rename_asset".parse::<TransactionName>().is_err());
    }
}

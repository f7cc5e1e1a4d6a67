//! Structural checks run before an import mutates anything.

use std::collections::BTreeMap;

use reliquary_model::item::ARK_PREFIX;
use reliquary_model::{
    Asset, AssetsDescription, ImportAction, ImportJobDescription, Item, ResourceId,
    ViewingDirection, ViewingHint,
};
use tracing::error;

use crate::collaborators::Collaborators;
use crate::error::{Failure, FailureCode};

/// What validation learned about the target of an import.
#[derive(Debug, Clone, Default)]
pub struct ValidatedImport {
    pub existing_item: Option<Item>,
    /// Current member assets keyed by original filename.
    pub existing_assets: BTreeMap<String, Asset>,
}

/// Collects every problem with a description before reporting, so an
/// operator can fix them in one pass.
#[derive(Debug)]
pub(crate) struct ImportValidator<'a> {
    collaborators: &'a Collaborators,
}

impl<'a> ImportValidator<'a> {
    pub(crate) fn new(collaborators: &'a Collaborators) -> Self {
        Self { collaborators }
    }

    pub(crate) async fn validate(
        &self,
        description: &ImportJobDescription,
    ) -> Result<ValidatedImport, Failure> {
        let mut errors = Vec::new();

        if is_blank(description.imported_by.as_deref()) {
            errors.push("imported_by can't be blank".to_string());
        }
        if let Some(direction) = &description.viewing_direction
            && direction.parse::<ViewingDirection>().is_err()
        {
            errors.push(format!("viewing_direction is not included in the list: {direction}"));
        }
        if let Some(hint) = &description.viewing_hint
            && hint.parse::<ViewingHint>().is_err()
        {
            errors.push(format!("viewing_hint is not included in the list: {hint}"));
        }

        let validated = match description.action {
            ImportAction::Create => {
                self.check_create(description, &mut errors).await?;
                ValidatedImport::default()
            }
            ImportAction::Update => self.check_update(description, &mut errors).await?,
        };

        if let Some(assets) = &description.assets {
            self.check_assets(assets, &validated, &mut errors).await?;
        }

        if errors.is_empty() {
            Ok(validated)
        } else {
            let mut failure = Failure::new(FailureCode::InvalidImport);
            failure.details = errors;
            Err(failure)
        }
    }

    async fn check_create(
        &self,
        description: &ImportJobDescription,
        errors: &mut Vec<String>,
    ) -> Result<(), Failure> {
        if is_blank(description.human_readable_name.as_deref()) {
            errors.push("human_readable_name can't be blank".to_string());
        }
        if description.metadata.is_empty() {
            errors.push("metadata can't be blank".to_string());
        }
        if description.assets.as_ref().is_none_or(AssetsDescription::is_empty) {
            errors.push("assets can't be blank".to_string());
        }

        let Some(identifier) = description.unique_identifier.as_deref().map(str::trim) else {
            return Ok(());
        };
        if !identifier.starts_with(ARK_PREFIX) {
            errors.push(format!(
                "unique_identifier must be an ark identifier starting with {ARK_PREFIX}"
            ));
            return Ok(());
        }

        let assigned = self
            .collaborators
            .repository
            .find_items_by_unique_identifier(identifier)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorLoadingResource, err))?;
        if !assigned.is_empty() {
            errors.push(format!(
                "unique_identifier {identifier} is already assigned to an item"
            ));
        }

        let minted = self
            .collaborators
            .identifiers
            .exists(identifier)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorResolvingIdentifier, err))?;
        if !minted {
            errors.push(format!("unique_identifier {identifier} has not been minted"));
        }
        Ok(())
    }

    async fn check_update(
        &self,
        description: &ImportJobDescription,
        errors: &mut Vec<String>,
    ) -> Result<ValidatedImport, Failure> {
        let Some(identifier) = description
            .unique_identifier
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            errors.push("unique_identifier can't be blank".to_string());
            return Ok(ValidatedImport::default());
        };

        let mut items = self
            .collaborators
            .repository
            .find_items_by_unique_identifier(identifier)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorLoadingResource, err))?;

        let item = match items.len() {
            0 => {
                errors.push(format!("unique_identifier {identifier} does not belong to an item"));
                return Ok(ValidatedImport::default());
            }
            1 => items.remove(0),
            count => {
                error!(
                    target: "reliquary::import",
                    unique_identifier = %identifier,
                    count,
                    "identifier is assigned to more than one item"
                );
                errors.push(format!(
                    "unique_identifier {identifier} is assigned to {count} items"
                ));
                return Ok(ValidatedImport::default());
            }
        };

        let members = self
            .collaborators
            .repository
            .find_many(&item.asset_ids)
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorLoadingResource, err))?;
        let mut existing_assets: BTreeMap<String, Asset> = BTreeMap::new();
        let mut shared: BTreeMap<String, Vec<ResourceId>> = BTreeMap::new();
        for asset in members.iter().filter_map(|record| record.as_asset()) {
            let Some(filename) = asset.original_filename.clone() else {
                errors.push(format!("existing asset {} has no filename", asset.id));
                continue;
            };
            if let Some(first) = existing_assets.get(&filename) {
                shared
                    .entry(filename)
                    .or_insert_with(|| vec![first.id])
                    .push(asset.id);
                continue;
            }
            existing_assets.insert(filename, asset.clone());
        }
        for (filename, ids) in &shared {
            let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
            errors.push(format!(
                "existing assets share the filename {filename}: {}",
                ids.join(", ")
            ));
        }
        let found: Vec<ResourceId> = members.iter().map(|record| record.id()).collect();
        for id in item.asset_ids.iter().filter(|id| !found.contains(id)) {
            errors.push(format!("existing asset {id} not found"));
        }

        Ok(ValidatedImport {
            existing_item: Some(item),
            existing_assets,
        })
    }

    async fn check_assets(
        &self,
        assets: &AssetsDescription,
        validated: &ValidatedImport,
        errors: &mut Vec<String>,
    ) -> Result<(), Failure> {
        let storage = assets.storage.trim();
        if storage.is_empty() {
            errors.push("assets.storage can't be blank".to_string());
        }

        let duplicates = assets.duplicate_filenames();
        if !duplicates.is_empty() {
            errors.push(format!("duplicate filenames: {}", duplicates.join(", ")));
        }

        if validated.existing_item.is_some() {
            let declared = assets.filenames();
            let missing: Vec<&str> = validated
                .existing_assets
                .keys()
                .map(String::as_str)
                .filter(|filename| !declared.contains(filename))
                .collect();
            if !missing.is_empty() {
                errors.push(format!(
                    "assets missing from import, all existing assets must be listed: {}",
                    missing.join(", ")
                ));
            }
        }

        for entry in assets.entries_by_filename() {
            let filename = entry.filename.trim();
            if filename.is_empty() {
                errors.push("assets contain an entry without a filename".to_string());
                continue;
            }
            if storage.is_empty() || validated.existing_assets.contains_key(filename) {
                continue;
            }
            let present = self
                .collaborators
                .staging
                .exists(storage, filename)
                .await
                .map_err(|err| Failure::from_core(FailureCode::ErrorReadingFile, err))?;
            if !present {
                errors.push(format!("file not found in {storage}: {filename}"));
            }
        }
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

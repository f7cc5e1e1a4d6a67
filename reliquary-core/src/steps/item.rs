//! Steps specific to item transactions.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reliquary_model::{
    Asset, DerivativeRecord, DerivativeType, Item, ResourceRecord,
};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{CoreError, Failure, FailureCode, Result};
use crate::jobs::JobPayload;
use crate::ports::{BlobStore, IdentifierAuthority, IdentifierMetadata, JobQueue, RepositoryStore};
use crate::state::ItemState;
use crate::transaction::{SideEffect, Step, StepResult};

/// Mint a persistent identifier for a new item that was not given one.
pub struct MintIdentifier {
    identifiers: Arc<dyn IdentifierAuthority>,
}

impl fmt::Debug for MintIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintIdentifier")
            .finish_non_exhaustive()
    }
}

impl MintIdentifier {
    pub fn new(identifiers: Arc<dyn IdentifierAuthority>) -> Self {
        Self { identifiers }
    }
}

#[async_trait]
impl Step<ItemState> for MintIdentifier {
    fn name(&self) -> &'static str {
        "mint_identifier"
    }

    async fn call(&self, mut state: ItemState) -> StepResult<ItemState> {
        if state.change_set()?.proposed().unique_identifier.is_some() {
            return Ok(state);
        }
        let identifier = self
            .identifiers
            .mint()
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorMintingIdentifier, err))?;
        state.change_set_mut()?.stage().unique_identifier = Some(identifier);
        Ok(state)
    }
}

/// First arranged asset, else first asset, when no thumbnail was chosen.
pub fn assign_default_thumbnail(mut state: ItemState) -> StepResult<ItemState> {
    let change_set = state.change_set_mut()?;
    if change_set.proposed().thumbnail_asset_id.is_none() {
        let thumbnail = change_set.proposed().default_thumbnail();
        if thumbnail.is_some() {
            change_set.stage().thumbnail_asset_id = thumbnail;
        }
    }
    Ok(state)
}

/// `first_published_at` is set once; `last_published_at` on every publish.
pub fn stamp_publication(mut state: ItemState) -> StepResult<ItemState> {
    let change_set = state.change_set_mut()?;
    if change_set.proposed().published {
        let now = Utc::now();
        let item = change_set.stage();
        item.first_published_at.get_or_insert(now);
        item.last_published_at = Some(now);
    }
    Ok(state)
}

/// Remember the member assets and derivative blobs of an item about to be
/// deleted.
pub fn collect_member_assets(mut state: ItemState) -> StepResult<ItemState> {
    let item = state.loaded()?;
    let asset_ids = item.asset_ids.clone();
    let derivative_ids = item.derivatives.iter().map(|d| d.file_id.clone()).collect();
    state.work.removed_asset_ids = asset_ids;
    state.superseded_derivatives = derivative_ids;
    Ok(state)
}

/// Build a IIIF Presentation manifest from the arranged assets' access
/// derivatives and replace the item's manifest derivative.
pub struct BuildIiifManifest {
    store: Arc<dyn RepositoryStore>,
    blobs: Arc<dyn BlobStore>,
}

impl fmt::Debug for BuildIiifManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildIiifManifest")
            .finish_non_exhaustive()
    }
}

impl BuildIiifManifest {
    pub fn new(store: Arc<dyn RepositoryStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }
}

#[async_trait]
impl Step<ItemState> for BuildIiifManifest {
    fn name(&self) -> &'static str {
        "build_iiif_manifest"
    }

    async fn call(&self, mut state: ItemState) -> StepResult<ItemState> {
        let item = state.loaded()?.clone();
        let records = self
            .store
            .find_many(item.arranged_asset_ids())
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorLoadingResource, err))?;
        let assets: Vec<Asset> = records
            .into_iter()
            .filter_map(|record| match record {
                ResourceRecord::Asset(asset) => Some(asset),
                ResourceRecord::Item(_) => None,
            })
            .filter(|asset| asset.derivative(DerivativeType::Access).is_some())
            .collect();
        if assets.is_empty() {
            debug!(target: "reliquary::transaction", item_id = %item.id, "no access derivatives, manifest skipped");
            return Ok(state);
        }

        let manifest = iiif_manifest(&item, &assets);
        let content = serde_json::to_vec_pretty(&manifest)
            .map_err(|err| Failure::internal("could not encode manifest").with_source(err.into()))?;
        let stored = self
            .blobs
            .upload(&content, item.id, DerivativeType::IiifManifest.as_str())
            .await
            .map_err(|err| Failure::from_core(FailureCode::ErrorUploadingFile, err))?;

        let previous = item.derivative(DerivativeType::IiifManifest).map(|d| d.file_id.clone());
        if previous.as_ref() != Some(&stored.id) {
            state.uploads.record(stored.id.clone());
            state.superseded_derivatives.extend(previous);
        }

        let derivatives = &mut state.change_set_mut()?.stage().derivatives;
        derivatives.retain(|d| d.kind != DerivativeType::IiifManifest);
        derivatives.push(DerivativeRecord::fresh(
            DerivativeType::IiifManifest,
            "application/json",
            stored.id,
            Utc::now(),
        ));
        Ok(state)
    }
}

/// Manifest in IIIF Presentation 3 shape: one canvas per arranged asset
/// with an access derivative, in arrangement order.
pub fn iiif_manifest(item: &Item, assets: &[Asset]) -> Value {
    let base = format!("urn:reliquary:item:{}", item.id);
    let label = item
        .descriptive_metadata
        .first(reliquary_model::DescriptiveMetadata::TITLE)
        .or(item.human_readable_name.as_deref())
        .unwrap_or_default();

    let items: Vec<Value> = item
        .arranged_asset_ids()
        .iter()
        .filter_map(|id| assets.iter().find(|asset| asset.id == *id))
        .enumerate()
        .filter_map(|(index, asset)| {
            let access = asset.derivative(DerivativeType::Access)?;
            let canvas = format!("{base}/canvas/{}", index + 1);
            let mut body = json!({
                "id": access.file_id.as_str(),
                "type": "Image",
                "format": access.mime_type,
            });
            if let (Some(width), Some(height)) =
                (asset.technical_metadata.width, asset.technical_metadata.height)
            {
                body["width"] = json!(width);
                body["height"] = json!(height);
            }
            Some(json!({
                "id": canvas,
                "type": "Canvas",
                "label": { "none": [asset.label.clone().or_else(|| asset.original_filename.clone()).unwrap_or_default()] },
                "items": [{
                    "id": format!("{canvas}/page"),
                    "type": "AnnotationPage",
                    "items": [{
                        "id": format!("{canvas}/page/painting"),
                        "type": "Annotation",
                        "motivation": "painting",
                        "body": body,
                        "target": canvas,
                    }],
                }],
            }))
        })
        .collect();

    let mut manifest = json!({
        "@context": "http://iiif.io/api/presentation/3/context.json",
        "id": format!("{base}/manifest"),
        "type": "Manifest",
        "label": { "none": [label] },
        "items": items,
    });
    if let Some(direction) = &item.structural_metadata.viewing_direction {
        manifest["viewingDirection"] = json!(direction);
    }
    if let Some(hint) = &item.structural_metadata.viewing_hint {
        manifest["behavior"] = json!([hint]);
    }
    if let Some(identifier) = &item.unique_identifier {
        manifest["homepage"] = json!([{ "id": identifier, "type": "Text", "label": { "none": [identifier] } }]);
    }
    manifest
}

/// Push descriptive metadata to the identifier authority.
pub struct RefreshIdentifierMetadata {
    identifiers: Arc<dyn IdentifierAuthority>,
}

impl fmt::Debug for RefreshIdentifierMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshIdentifierMetadata")
            .finish_non_exhaustive()
    }
}

impl RefreshIdentifierMetadata {
    pub fn new(identifiers: Arc<dyn IdentifierAuthority>) -> Self {
        Self { identifiers }
    }
}

#[async_trait]
impl SideEffect<ItemState> for RefreshIdentifierMetadata {
    fn name(&self) -> &'static str {
        "refresh_identifier_metadata"
    }

    async fn run(&self, state: &ItemState) -> Result<()> {
        let item = state
            .resource
            .as_ref()
            .ok_or_else(|| CoreError::Internal("item was not saved".into()))?;
        let Some(identifier) = item.unique_identifier.as_deref() else {
            return Ok(());
        };
        self.identifiers
            .update_metadata(identifier, &IdentifierMetadata::for_item(item))
            .await
    }
}

/// Queue deletion of every asset that belonged to a deleted item.
pub struct EnqueueAssetDeletion {
    jobs: Arc<dyn JobQueue>,
}

impl fmt::Debug for EnqueueAssetDeletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnqueueAssetDeletion")
            .finish_non_exhaustive()
    }
}

impl EnqueueAssetDeletion {
    pub fn new(jobs: Arc<dyn JobQueue>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl SideEffect<ItemState> for EnqueueAssetDeletion {
    fn name(&self) -> &'static str {
        "enqueue_asset_deletion"
    }

    async fn run(&self, state: &ItemState) -> Result<()> {
        for asset_id in &state.work.removed_asset_ids {
            self.jobs
                .enqueue(JobPayload::DeleteAsset {
                    asset_id: *asset_id,
                    deleted_by: state.updated_by.clone(),
                })
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reliquary_model::{BlobId, Resource, ResourceId};

    fn asset_with_access(label: &str) -> Asset {
        let mut asset = Asset::blank(ResourceId::new());
        asset.label = Some(label.into());
        asset.derivatives.push(DerivativeRecord::fresh(
            DerivativeType::Access,
            "image/jpeg",
            BlobId::new(format!("derivatives://{label}")),
            Utc::now(),
        ));
        asset
    }

    #[test]
    fn manifest_follows_arrangement_order() {
        let front = asset_with_access("front");
        let back = asset_with_access("back");
        let mut item = Item::blank(ResourceId::new());
        item.human_readable_name = Some("Letter".into());
        item.asset_ids = vec![back.id, front.id];
        item.structural_metadata.arranged_asset_ids = vec![front.id, back.id];
        item.structural_metadata.viewing_direction = Some("left-to-right".into());

        let manifest = iiif_manifest(&item, &[back.clone(), front.clone()]);
        assert_eq!(manifest["type"], "Manifest");
        assert_eq!(manifest["label"]["none"][0], "Letter");
        assert_eq!(manifest["viewingDirection"], "left-to-right");
        let canvases = manifest["items"].as_array().unwrap();
        assert_eq!(canvases.len(), 2);
        assert_eq!(canvases[0]["label"]["none"][0], "front");
        assert_eq!(
            canvases[1]["items"][0]["items"][0]["body"]["id"],
            "derivatives://back"
        );
    }
}

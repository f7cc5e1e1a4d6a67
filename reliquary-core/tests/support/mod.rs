//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use reliquary_core::infra::memory::InMemoryStack;
use reliquary_core::model::{
    Asset, AssetAttributes, DescriptiveMetadata, Item, ItemAttributes, ResourceId,
    StructuralAttributes,
};
use reliquary_core::{FileUpload, PipelineConfig, Reliquary, ResourceTransactions};

pub const ACTOR: &str = "archivist@example.edu";
pub const STORAGE: &str = "sceti-digitized";

/// A small TIFF-looking payload; `marker` makes the content unique.
pub fn tiff(marker: &str) -> Vec<u8> {
    let mut content = b"II*\x00".to_vec();
    content.extend_from_slice(marker.as_bytes());
    content
}

pub fn metadata(title: &str) -> DescriptiveMetadata {
    DescriptiveMetadata::new()
        .with(DescriptiveMetadata::TITLE, &[title])
        .with("creator", &["Unknown scribe"])
}

pub struct Harness {
    pub stack: InMemoryStack,
    pub reliquary: Reliquary,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_stack(InMemoryStack::new())
    }

    pub fn with_stack(stack: InMemoryStack) -> Self {
        Self::with_config(stack, PipelineConfig::default())
    }

    pub fn with_config(stack: InMemoryStack, config: PipelineConfig) -> Self {
        let reliquary = Reliquary::new(stack.collaborators(), config);
        Self { stack, reliquary }
    }

    pub fn transactions(&self) -> &ResourceTransactions {
        self.reliquary.transactions()
    }

    pub async fn metadata_only_asset(&self, filename: &str) -> Asset {
        self.transactions()
            .create_asset(
                AssetAttributes {
                    original_filename: Some(filename.into()),
                    ..Default::default()
                },
                ACTOR,
            )
            .await
            .expect("create asset")
    }

    pub async fn asset_with_file(&self, filename: &str, content: Vec<u8>) -> Asset {
        let asset = self.metadata_only_asset(filename).await;
        self.transactions()
            .update_asset(
                asset.id,
                AssetAttributes::default(),
                Some(ACTOR.into()),
                Some(FileUpload::new(filename, content)),
            )
            .await
            .expect("attach preservation file")
    }

    pub async fn item_with(&self, asset_ids: &[ResourceId], arranged: &[ResourceId]) -> Item {
        self.transactions()
            .create_item(
                ItemAttributes {
                    human_readable_name: Some("Letter to a friend".into()),
                    descriptive_metadata: Some(metadata("Letter to a friend")),
                    structural_metadata: Some(StructuralAttributes {
                        arranged_asset_ids: Some(arranged.to_vec()),
                        ..Default::default()
                    }),
                    asset_ids: Some(asset_ids.to_vec()),
                    ..Default::default()
                },
                ACTOR,
            )
            .await
            .expect("create item")
    }

    pub async fn asset(&self, id: ResourceId) -> Option<Asset> {
        use reliquary_core::ports::RepositoryStore;
        self.stack
            .repository
            .find(id)
            .await
            .expect("repository find")
            .and_then(|record| record.as_asset().cloned())
    }

    pub async fn item(&self, id: ResourceId) -> Option<Item> {
        use reliquary_core::ports::RepositoryStore;
        self.stack
            .repository
            .find(id)
            .await
            .expect("repository find")
            .and_then(|record| record.as_item().cloned())
    }

    /// Run queued jobs until the queue is empty.
    pub async fn drain_jobs(&self) {
        self.stack.jobs.drain(self.reliquary.runner()).await;
    }
}

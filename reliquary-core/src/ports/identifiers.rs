use async_trait::async_trait;
use reliquary_model::{DescriptiveMetadata, Item};

use crate::error::Result;

/// Descriptive fields pushed to the identifier authority for an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierMetadata {
    pub who: Option<String>,
    pub what: Option<String>,
    pub when: Option<String>,
}

impl IdentifierMetadata {
    pub fn for_item(item: &Item) -> Self {
        let metadata: &DescriptiveMetadata = &item.descriptive_metadata;
        Self {
            who: metadata.first("creator").map(str::to_string),
            what: metadata
                .first(DescriptiveMetadata::TITLE)
                .map(str::to_string)
                .or_else(|| item.human_readable_name.clone()),
            when: metadata.first("date").map(str::to_string),
        }
    }
}

/// Mints and maintains persistent identifiers (`ark:/...`).
#[async_trait]
pub trait IdentifierAuthority: Send + Sync {
    async fn mint(&self) -> Result<String>;

    async fn exists(&self, identifier: &str) -> Result<bool>;

    async fn update_metadata(&self, identifier: &str, metadata: &IdentifierMetadata) -> Result<()>;
}

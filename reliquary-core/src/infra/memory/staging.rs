use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CoreError, Result};
use crate::ports::StagingArea;

#[derive(Debug, Default)]
pub struct InMemoryStagingArea {
    files: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryStagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, location: &str, filename: &str, content: impl Into<Vec<u8>>) {
        self.files
            .write()
            .await
            .insert((location.to_string(), filename.to_string()), content.into());
    }
}

#[async_trait]
impl StagingArea for InMemoryStagingArea {
    async fn exists(&self, location: &str, filename: &str) -> Result<bool> {
        Ok(self
            .files
            .read()
            .await
            .contains_key(&(location.to_string(), filename.to_string())))
    }

    async fn read(&self, location: &str, filename: &str) -> Result<Vec<u8>> {
        self.files
            .read()
            .await
            .get(&(location.to_string(), filename.to_string()))
            .cloned()
            .ok_or_else(|| CoreError::not_found("staged file", format!("{location}/{filename}")))
    }
}

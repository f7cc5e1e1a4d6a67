use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{CoreError, Result};
use crate::ports::StagingArea;

/// Staging area rooted at a local directory: `{root}/{location}/{filename}`.
#[derive(Debug, Clone)]
pub struct LocalStagingArea {
    root: PathBuf,
}

impl LocalStagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject anything that could escape the root.
    fn resolve(&self, location: &str, filename: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for part in [location, filename] {
            let relative = Path::new(part);
            let safe = relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
            if part.is_empty() || !safe {
                return Err(CoreError::Conflict(format!("invalid staging path: {part}")));
            }
            path.push(relative);
        }
        Ok(path)
    }
}

#[async_trait]
impl StagingArea for LocalStagingArea {
    async fn exists(&self, location: &str, filename: &str) -> Result<bool> {
        let path = self.resolve(location, filename)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn read(&self, location: &str, filename: &str) -> Result<Vec<u8>> {
        let path = self.resolve(location, filename)?;
        tokio::fs::read(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                CoreError::not_found("staged file", path.display())
            } else {
                err.into()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_files_below_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sceti/letters")).unwrap();
        std::fs::write(dir.path().join("sceti/letters/front.tif"), b"front").unwrap();

        let staging = LocalStagingArea::new(dir.path());
        assert!(staging.exists("sceti", "letters/front.tif").await.unwrap());
        assert!(!staging.exists("sceti", "letters/back.tif").await.unwrap());
        assert_eq!(staging.read("sceti", "letters/front.tif").await.unwrap(), b"front");
        assert!(staging.read("sceti", "letters/back.tif").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let staging = LocalStagingArea::new(dir.path());
        assert!(staging.exists("sceti", "../secret").await.is_err());
        assert!(staging.exists("/etc", "passwd").await.is_err());
    }
}

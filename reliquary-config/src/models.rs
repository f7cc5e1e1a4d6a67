use std::path::PathBuf;

use reliquary_core::PipelineConfig;
use reliquary_core::infra::LocalStagingArea;
use serde::{Deserialize, Serialize};

/// Fully resolved configuration.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ReliquaryConfig {
    pub pipeline: PipelineConfig,
    pub import: ImportConfig,
    pub logging: LoggingConfig,
}

impl ReliquaryConfig {
    /// Staging area backed by `import.staging_root`.
    pub fn local_staging(&self) -> LocalStagingArea {
        LocalStagingArea::new(self.import.staging_root.clone())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImportConfig {
    /// Directory whose subdirectories are the staging locations named by
    /// import descriptions.
    pub staging_root: PathBuf,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            staging_root: PathBuf::from("staging"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info,reliquary::jobs=info,reliquary::import=info".to_string(),
        }
    }
}

//! Knobs for the transaction pipeline and the job runner.

use std::time::Duration;

use reliquary_model::DerivativeType;
use serde::{Deserialize, Serialize};

/// Everything the core reads from configuration.
///
/// All fields carry defaults so a deployment only supplies what it changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Files larger than this are not virus scanned; a warning event is
    /// recorded instead.
    pub virus_scan_max_bytes: u64,
    /// Derivative types generated per mime family.
    pub derivatives: DerivativeConfig,
    /// Retry/backoff policy for background jobs.
    pub retry: RetryConfig,
    /// Actor recorded by background jobs that act without a requesting user.
    pub system_actor: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            virus_scan_max_bytes: 4 * 1024 * 1024 * 1024,
            derivatives: DerivativeConfig::default(),
            retry: RetryConfig::default(),
            system_actor: "reliquary-system".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DerivativeConfig {
    pub image: Vec<DerivativeType>,
    pub audio: Vec<DerivativeType>,
    pub video: Vec<DerivativeType>,
    pub pdf: Vec<DerivativeType>,
}

impl DerivativeConfig {
    /// Derivative types configured for `mime_type`. Unknown families get
    /// none.
    pub fn types_for(&self, mime_type: &str) -> &[DerivativeType] {
        let family = mime_type.split('/').next().unwrap_or_default();
        match family {
            "image" => &self.image,
            "audio" => &self.audio,
            "video" => &self.video,
            _ if mime_type == "application/pdf" => &self.pdf,
            _ => &[],
        }
    }
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            image: vec![
                DerivativeType::Thumbnail,
                DerivativeType::Access,
                DerivativeType::TextonlyPdf,
                DerivativeType::Text,
                DerivativeType::Hocr,
            ],
            audio: vec![DerivativeType::Access],
            video: vec![DerivativeType::Thumbnail, DerivativeType::Access],
            pdf: vec![DerivativeType::Thumbnail],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u16,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Delay before the next attempt after `attempts` failures, doubling
    /// from the base and capped at the max.
    pub fn backoff_for(&self, attempts: u16) -> Duration {
        let exponent = u32::from(attempts.saturating_sub(1)).min(20);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_base_ms: 2_000,
            backoff_max_ms: 5 * 60 * 1_000,
        }
    }
}

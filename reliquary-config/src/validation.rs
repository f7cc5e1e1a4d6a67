use thiserror::Error;

use crate::models::ReliquaryConfig;

/// Settings that would leave the pipeline unable to do its job.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("pipeline.retry.max_attempts must be at least 1")]
    ZeroMaxAttempts,
    #[error(
        "pipeline.retry.backoff_base_ms ({base}) must not exceed pipeline.retry.backoff_max_ms ({max})"
    )]
    BackoffBaseExceedsMax { base: u64, max: u64 },
    #[error("pipeline.system_actor can't be blank")]
    BlankSystemActor,
}

pub fn check(config: &ReliquaryConfig) -> Result<(), ConfigGuardRailError> {
    let retry = &config.pipeline.retry;
    if retry.max_attempts == 0 {
        return Err(ConfigGuardRailError::ZeroMaxAttempts);
    }
    if retry.backoff_base_ms > retry.backoff_max_ms {
        return Err(ConfigGuardRailError::BackoffBaseExceedsMax {
            base: retry.backoff_base_ms,
            max: retry.backoff_max_ms,
        });
    }
    if config.pipeline.system_actor.trim().is_empty() {
        return Err(ConfigGuardRailError::BlankSystemActor);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        assert_eq!(check(&ReliquaryConfig::default()), Ok(()));
    }

    #[test]
    fn inverted_backoff_is_rejected() {
        let mut config = ReliquaryConfig::default();
        config.pipeline.retry.backoff_base_ms = 10_000;
        config.pipeline.retry.backoff_max_ms = 1_000;
        assert_eq!(
            check(&config),
            Err(ConfigGuardRailError::BackoffBaseExceedsMax {
                base: 10_000,
                max: 1_000
            })
        );
    }
}

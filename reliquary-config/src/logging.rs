use anyhow::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::models::LoggingConfig;

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// default filter.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_filter)
            .with_context(|| format!("invalid log filter {:?}", config.default_filter))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("failed to install tracing subscriber")
}

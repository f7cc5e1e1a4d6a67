use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use tracing::{debug, info};

use crate::models::ReliquaryConfig;
use crate::validation;

const DEFAULT_CANDIDATES: &[&str] = &["reliquary.toml", "reliquary.json", "config/reliquary.toml"];

/// Where the loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    Explicit(PathBuf),
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// Environment inputs consulted by the loader.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub config_json: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: non_blank_var("RELIQUARY_CONFIG_PATH").map(PathBuf::from),
            config_json: non_blank_var("RELIQUARY_CONFIG_JSON"),
        }
    }
}

fn non_blank_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: ReliquaryConfig,
    pub source: ConfigSource,
    pub env_file_loaded: bool,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
    search_root: Option<PathBuf>,
    env: Option<EnvConfig>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load this file and nothing else; a missing file is an error.
    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Directory the default candidates are resolved against. Defaults to
    /// the working directory.
    pub fn with_search_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.search_root = Some(root.into());
        self
    }

    /// Use `env` instead of reading the process environment.
    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.env = Some(env);
        self
    }

    /// Resolution order: explicit path, `$RELIQUARY_CONFIG_PATH`,
    /// `$RELIQUARY_CONFIG_JSON`, the first default file found, defaults.
    pub fn load(&self) -> anyhow::Result<ConfigLoad> {
        let env_file_loaded = self.load_env_file()?;
        let env = self.env.clone().unwrap_or_else(EnvConfig::gather);

        let (config, source) = self.resolve(&env)?;
        validation::check(&config).context("configuration rejected")?;

        info!(source = ?source, "configuration loaded");
        Ok(ConfigLoad {
            config,
            source,
            env_file_loaded,
        })
    }

    fn load_env_file(&self) -> anyhow::Result<bool> {
        let loaded = match &self.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true),
            None => dotenvy::dotenv().map(|_| true),
        };
        match loaded {
            Ok(loaded) => Ok(loaded),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err).context("failed to parse .env file"),
        }
    }

    fn resolve(&self, env: &EnvConfig) -> anyhow::Result<(ReliquaryConfig, ConfigSource)> {
        if let Some(path) = &self.config_path {
            let config = load_from_file(path)?;
            return Ok((config, ConfigSource::Explicit(path.clone())));
        }

        if let Some(path) = &env.config_path {
            let config = load_from_file(path)
                .context("failed to load RELIQUARY_CONFIG_PATH")?;
            return Ok((config, ConfigSource::EnvPath(path.clone())));
        }

        if let Some(raw) = &env.config_json {
            let config = parse_json(raw).context("failed to parse RELIQUARY_CONFIG_JSON")?;
            return Ok((config, ConfigSource::EnvInline));
        }

        if let Some(path) = self.find_default_file() {
            let config = load_from_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }

        debug!("no configuration file found, using defaults");
        Ok((ReliquaryConfig::default(), ConfigSource::Default))
    }

    fn find_default_file(&self) -> Option<PathBuf> {
        let root = self.search_root.clone().unwrap_or_default();
        DEFAULT_CANDIDATES
            .iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.exists())
    }
}

pub fn load_from_file(path: &Path) -> anyhow::Result<ReliquaryConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config from {}", path.display()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => {
            parse_json(&contents).with_context(|| format!("invalid config {}", path.display()))
        }
        Some("toml") => toml::from_str(&contents)
            .map_err(|err| anyhow!("invalid config {}: {}", path.display(), err)),
        _ => parse_from_str(&contents, &path.display().to_string()),
    }
}

/// TOML first, then JSON.
pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<ReliquaryConfig> {
    toml::from_str(contents).or_else(|toml_err| {
        serde_json::from_str(contents).map_err(|json_err| {
            anyhow!(
                "failed to parse config {}: toml error: {}; json error: {}",
                origin,
                toml_err,
                json_err
            )
        })
    })
}

pub fn parse_json(raw: &str) -> anyhow::Result<ReliquaryConfig> {
    serde_json::from_str(raw).map_err(|err| anyhow!("invalid config json: {err}"))
}

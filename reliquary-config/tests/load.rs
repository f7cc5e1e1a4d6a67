use std::fs;
use std::path::PathBuf;

use reliquary_config::{ConfigGuardRailError, ConfigLoader, ConfigSource, EnvConfig};
use reliquary_core::model::DerivativeType;
use tempfile::TempDir;

fn isolated(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::new()
        .with_search_root(dir.path())
        .with_env_file(dir.path().join(".env"))
        .with_env(EnvConfig::default())
}

#[test]
fn defaults_when_nothing_is_configured() {
    let dir = TempDir::new().unwrap();
    let load = isolated(&dir).load().unwrap();

    assert_eq!(load.source, ConfigSource::Default);
    assert!(!load.env_file_loaded);
    assert_eq!(load.config.pipeline.system_actor, "reliquary-system");
}

#[test]
fn default_toml_file_is_picked_up() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("reliquary.toml"),
        r#"
        [pipeline]
        system_actor = "preservation-bot"

        [pipeline.derivatives]
        image = ["thumbnail", "access"]

        [import]
        staging_root = "/srv/reliquary/staging"
        "#,
    )
    .unwrap();

    let load = isolated(&dir).load().unwrap();

    assert_eq!(load.source, ConfigSource::File(dir.path().join("reliquary.toml")));
    assert_eq!(load.config.pipeline.system_actor, "preservation-bot");
    assert_eq!(
        load.config.pipeline.derivatives.image,
        vec![DerivativeType::Thumbnail, DerivativeType::Access]
    );
    assert_eq!(
        load.config.import.staging_root,
        PathBuf::from("/srv/reliquary/staging")
    );
}

#[test]
fn env_path_wins_over_inline_json_and_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("reliquary.toml"), "").unwrap();
    let custom = dir.path().join("custom.json");
    fs::write(&custom, r#"{"pipeline": {"retry": {"max_attempts": 2}}}"#).unwrap();

    let load = isolated(&dir)
        .with_env(EnvConfig {
            config_path: Some(custom.clone()),
            config_json: Some(r#"{"pipeline": {"retry": {"max_attempts": 9}}}"#.into()),
        })
        .load()
        .unwrap();

    assert_eq!(load.source, ConfigSource::EnvPath(custom));
    assert_eq!(load.config.pipeline.retry.max_attempts, 2);
}

#[test]
fn inline_json_is_used_without_a_path() {
    let dir = TempDir::new().unwrap();
    let load = isolated(&dir)
        .with_env(EnvConfig {
            config_path: None,
            config_json: Some(r#"{"logging": {"default_filter": "debug"}}"#.into()),
        })
        .load()
        .unwrap();

    assert_eq!(load.source, ConfigSource::EnvInline);
    assert_eq!(load.config.logging.default_filter, "debug");
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = isolated(&dir)
        .with_config_path(dir.path().join("absent.toml"))
        .load();
    assert!(result.is_err());
}

#[test]
fn guard_rails_reject_zero_attempts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reliquary.toml");
    fs::write(&path, "[pipeline.retry]\nmax_attempts = 0\n").unwrap();

    let err = isolated(&dir).with_config_path(&path).load().unwrap_err();

    assert_eq!(
        err.downcast_ref::<ConfigGuardRailError>(),
        Some(&ConfigGuardRailError::ZeroMaxAttempts)
    );
}

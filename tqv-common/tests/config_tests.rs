//! Tests for root folder resolution and TOML config loading
//!
//! Note: Uses serial_test to prevent ENV variable race conditions. Tests that
//! set TQV_TEST_ROOT are marked with #[serial].

use serde::{Deserialize, Serialize};
use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tqv_common::config::{
    load_toml_config, locate_config_file, resolve_root_folder, write_toml_config, LoggingConfig,
};
use tqv_common::Error;

const ENV_VAR: &str = "TQV_TEST_ROOT";

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct SampleConfig {
    #[serde(default)]
    root_folder: Option<PathBuf>,
    #[serde(default)]
    logging: LoggingConfig,
}

// ============================================================================
// Root folder resolution
// ============================================================================

#[test]
#[serial]
fn test_cli_overrides_env_and_toml() {
    std::env::set_var(ENV_VAR, "/from/env");
    let resolved = resolve_root_folder(
        Some(Path::new("/from/cli")),
        ENV_VAR,
        Some(Path::new("/from/toml")),
    );
    std::env::remove_var(ENV_VAR);
    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    std::env::set_var(ENV_VAR, "/from/env");
    let resolved = resolve_root_folder(None, ENV_VAR, Some(Path::new("/from/toml")));
    std::env::remove_var(ENV_VAR);
    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    std::env::set_var(ENV_VAR, "  ");
    let resolved = resolve_root_folder(None, ENV_VAR, Some(Path::new("/from/toml")));
    std::env::remove_var(ENV_VAR);
    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_compiled_default_last() {
    std::env::remove_var(ENV_VAR);
    let resolved = resolve_root_folder(None, ENV_VAR, None);
    assert!(!resolved.as_os_str().is_empty());
}

// ============================================================================
// TOML loading
// ============================================================================

#[test]
fn test_missing_file_gives_defaults() {
    let dir = TempDir::new().unwrap();
    let config: SampleConfig = load_toml_config(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, SampleConfig::default());

    let config: SampleConfig = load_toml_config(None).unwrap();
    assert_eq!(config, SampleConfig::default());
}

#[test]
fn test_unparseable_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "root_folder = [unterminated").unwrap();

    let result: Result<SampleConfig, _> = load_toml_config(Some(&path));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_write_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("tqv.toml");
    let config = SampleConfig {
        root_folder: Some(PathBuf::from("/srv/tqv")),
        logging: LoggingConfig {
            level: "debug".to_string(),
            file: None,
        },
    };

    write_toml_config(&config, &path).unwrap();
    assert!(!path.with_extension("toml.tmp").exists());

    let loaded: SampleConfig = load_toml_config(Some(&path)).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_explicit_config_path_wins() {
    let explicit = PathBuf::from("/tmp/somewhere/custom.toml");
    assert_eq!(
        locate_config_file(Some(&explicit), "tqv-verifier.toml"),
        Some(explicit)
    );
}

//! Configuration and root folder resolution
//!
//! Tests that touch ROSTER_* environment variables are `#[serial]` so they
//! never run in parallel with each other.

use roster_common::config::{
    load_module_config, CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
    CONFIG_PATH_ENV, ROOT_ENV, ROOT_FOLDER_ENV,
};
use roster_common::{RosterContext, SourceMode};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    env::remove_var(ROOT_ENV);
    env::remove_var(CONFIG_PATH_ENV);
}

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.to_string_lossy().contains("roster"));
}

#[test]
#[serial]
fn test_cli_arg_has_highest_priority() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/roster-env");

    let root = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/roster-cli")))
        .with_config_root(Some(PathBuf::from("/tmp/roster-toml")))
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/roster-cli"));

    clear_env();
}

#[test]
#[serial]
fn test_root_folder_env_beats_short_alias() {
    clear_env();
    env::set_var(ROOT_FOLDER_ENV, "/tmp/roster-long");
    env::set_var(ROOT_ENV, "/tmp/roster-short");

    assert_eq!(
        RootFolderResolver::new("test-module").resolve(),
        PathBuf::from("/tmp/roster-long")
    );

    env::remove_var(ROOT_FOLDER_ENV);
    assert_eq!(
        RootFolderResolver::new("test-module").resolve(),
        PathBuf::from("/tmp/roster-short")
    );

    clear_env();
}

#[test]
#[serial]
fn test_environment_beats_config_root() {
    clear_env();
    env::set_var(ROOT_ENV, "/tmp/roster-env");

    let root = RootFolderResolver::new("test-module")
        .with_config_root(Some(PathBuf::from("/tmp/roster-toml")))
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/roster-env"));

    clear_env();
}

#[test]
#[serial]
fn test_config_file_root_folder() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("dash.toml");
    std::fs::write(&config_path, "root_folder = \"/tmp/roster-from-toml\"\n").unwrap();

    let config = load_module_config("test-module", Some(&config_path));
    assert_eq!(config.root_folder, Some(PathBuf::from("/tmp/roster-from-toml")));

    env::set_var(CONFIG_PATH_ENV, &config_path);
    let from_env = load_module_config("test-module", None);
    assert_eq!(from_env, config);

    let root = RootFolderResolver::new("test-module")
        .with_config_root(from_env.root_folder)
        .resolve();
    assert_eq!(root, PathBuf::from("/tmp/roster-from-toml"));

    clear_env();
}

#[test]
#[serial]
fn test_missing_config_file_degrades_to_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let config = load_module_config("nonexistent-test-module-12345", Some(&missing));
    assert_eq!(config, TomlConfig::default());

    let root = RootFolderResolver::new("nonexistent-test-module-12345")
        .with_config_root(config.root_folder)
        .resolve();
    assert_eq!(root, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_unparseable_config_degrades_to_defaults() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "demo_mode = [").unwrap();

    assert_eq!(load_module_config("test-module", Some(&path)), TomlConfig::default());
}

#[test]
#[serial]
fn test_full_config_file_selects_demo_mode() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dash.toml");
    std::fs::write(
        &path,
        "port = 8080\ndemo_mode = true\nrequest_timeout_ms = 2000\n\n[logging]\nlevel = \"debug\"\n",
    )
    .unwrap();

    let loaded = load_module_config("test-module", Some(&path));
    assert_eq!(loaded.port_or_default(), 8080);
    assert_eq!(loaded.request_timeout_ms_or_default(), 2000);
    assert_eq!(loaded.logging.level, "debug");
    assert_eq!(RosterContext::from_config(&loaded).mode, SourceMode::Demo);
}

#[test]
fn test_initializer_creates_nested_directories() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("a").join("b").join("roster");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert_eq!(initializer.overrides_dir(), root.join("overrides"));
}

//! Configuration loading and precedence tests

use hearth_config::{ConfigError, ConfigLoader, GlobalConfig, PROJECT_CONFIG_FILE};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join(PROJECT_CONFIG_FILE);
    fs::write(&config_path, content).unwrap();
    config_path
}

fn loader_without_global(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::with_global_config_path(dir.path().join("missing-global.toml"))
}

// ============================================================================
// Config Loading Tests
// ============================================================================

#[test]
#[serial]
fn test_load_when_no_config_exists() {
    let temp_dir = TempDir::new().unwrap();

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    assert!(!config.is_project());
    assert_eq!(config.server_api(), "cli");
    assert!(config.include_paths().is_empty());
}

#[test]
#[serial]
fn test_load_with_empty_config() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "");

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    // Empty config is valid (all fields optional)
    assert!(config.is_project());
    assert_eq!(config.script_root(), Some(temp_dir.path().to_path_buf()));
}

#[test]
#[serial]
fn test_load_from_deep_subdirectory_finds_parent() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[runtime]\nserver-api = \"embed\"\n");

    let sub2 = temp_dir.path().join("sub1").join("sub2");
    fs::create_dir_all(&sub2).unwrap();

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(&sub2).unwrap();

    assert_eq!(config.server_api(), "embed");
    assert_eq!(config.project_root(), Some(temp_dir.path()));
}

#[test]
#[serial]
fn test_load_from_specific_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_config_file(
        temp_dir.path(),
        r#"
[runtime]
root = "www"

[include]
paths = ["lib", "/usr/share/hearth"]
"#,
    );

    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_file(&config_path).unwrap();

    assert_eq!(config.script_root(), Some(temp_dir.path().join("www")));
    assert_eq!(
        config.include_paths(),
        vec![
            temp_dir.path().join("lib"),
            PathBuf::from("/usr/share/hearth")
        ]
    );
}

// ============================================================================
// Global Config Precedence
// ============================================================================

#[test]
#[serial]
fn test_global_defaults_apply_when_project_is_silent() {
    let temp_dir = TempDir::new().unwrap();
    let global_path = temp_dir.path().join("global.toml");
    fs::write(
        &global_path,
        "[defaults]\nserver-api = \"fpm\"\ninclude-paths = [\"/opt/hearth\"]\n",
    )
    .unwrap();
    create_config_file(temp_dir.path(), "[include]\npaths = [\"lib\"]\n");

    let mut loader = ConfigLoader::with_global_config_path(&global_path);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    assert_eq!(config.server_api(), "fpm");
    // project include paths come before global ones
    assert_eq!(
        config.include_paths(),
        vec![temp_dir.path().join("lib"), PathBuf::from("/opt/hearth")]
    );
}

#[test]
#[serial]
fn test_project_overrides_global_server_api() {
    let temp_dir = TempDir::new().unwrap();
    let global_path = temp_dir.path().join("global.toml");
    fs::write(&global_path, "[defaults]\nserver-api = \"fpm\"\n").unwrap();
    create_config_file(temp_dir.path(), "[runtime]\nserver-api = \"embed\"\n");

    let mut loader = ConfigLoader::with_global_config_path(&global_path);
    let config = loader.load_from_directory(temp_dir.path()).unwrap();

    assert_eq!(config.server_api(), "embed");
}

#[test]
fn test_global_config_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let result = GlobalConfig::load_from_file(&temp_dir.path().join("absent.toml"));

    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

// ============================================================================
// Environment Overrides
// ============================================================================

#[test]
#[serial]
fn test_env_root_override() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[runtime]\nroot = \"app\"\n");

    env::set_var("HEARTH_ROOT", "/srv/other");
    let mut loader = loader_without_global(&temp_dir);
    let config = loader.load_from_directory(temp_dir.path());
    env::remove_var("HEARTH_ROOT");

    // absolute override wins over the project root join
    assert_eq!(config.unwrap().script_root(), Some(PathBuf::from("/srv/other")));
}

#[test]
#[serial]
fn test_env_invalid_server_api_rejected() {
    let temp_dir = TempDir::new().unwrap();

    env::set_var("HEARTH_SERVER_API", "not valid");
    let mut loader = loader_without_global(&temp_dir);
    let result = loader.load_from_directory(temp_dir.path());
    env::remove_var("HEARTH_SERVER_API");

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

#[rstest]
#[case::broken_toml("[runtime\nroot = \"x")]
#[case::unknown_section("[package]\nname = \"x\"\n")]
#[case::unknown_field("[runtime]\nthreads = 4\n")]
#[case::bad_server_api("[runtime]\nserver-api = \"a b\"\n")]
#[case::empty_include_entry("[include]\npaths = [\"\"]\n")]
fn test_invalid_project_config_rejected(#[case] content: &str) {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), content);

    let mut loader = loader_without_global(&temp_dir);
    let result = loader.load_from_directory(temp_dir.path());

    assert!(result.is_err(), "expected error for {:?}", content);
}

//! Global Configuration (~/.hearth/config.toml)
//!
//! Handles user-level configuration stored in `~/.hearth/config.toml`.

use crate::project::validate_server_api;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global user configuration from ~/.hearth/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default settings applied to every run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct DefaultsConfig {
    /// Include paths searched after project include paths
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_paths: Vec<PathBuf>,

    /// Default server API name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_api: Option<String>,
}

impl GlobalConfig {
    /// Load global configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the global configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(defaults) = &self.defaults {
            if let Some(api) = &defaults.server_api {
                validate_server_api("defaults.server-api", api)?;
            }
        }
        Ok(())
    }

    /// Get the global config file path (~/.hearth/config.toml)
    pub fn global_config_path() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".hearth").join("config.toml"))
    }

    /// Default include paths
    pub fn include_paths(&self) -> &[PathBuf] {
        self.defaults
            .as_ref()
            .map(|d| d.include_paths.as_slice())
            .unwrap_or(&[])
    }

    /// Default server API name
    pub fn server_api(&self) -> Option<&str> {
        self.defaults.as_ref().and_then(|d| d.server_api.as_deref())
    }

    /// Merge another global config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &GlobalConfig) {
        if other.defaults.is_some() {
            self.defaults = other.defaults.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_global_config() {
        let toml = r#"
[defaults]
server-api = "fpm"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server_api(), Some("fpm"));
        assert!(config.include_paths().is_empty());
    }

    #[test]
    fn test_parse_include_paths() {
        let toml = r#"
[defaults]
include-paths = ["/usr/share/hearth", "vendor"]
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.include_paths(),
            &[PathBuf::from("/usr/share/hearth"), PathBuf::from("vendor")]
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
[defaults]
editor = "vim"
"#;

        assert!(toml::from_str::<GlobalConfig>(toml).is_err());
    }

    #[test]
    fn test_invalid_server_api() {
        let config = GlobalConfig {
            defaults: Some(DefaultsConfig {
                include_paths: Vec::new(),
                server_api: Some("has space".to_string()),
            }),
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_configs() {
        let mut base = GlobalConfig::default();
        let override_config = GlobalConfig {
            defaults: Some(DefaultsConfig {
                include_paths: vec![PathBuf::from("lib")],
                server_api: None,
            }),
        };

        base.merge(&override_config);
        assert_eq!(base.include_paths(), &[PathBuf::from("lib")]);
    }
}

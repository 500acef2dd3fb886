//! Project Configuration (hearth.toml)
//!
//! Handles project-level configuration stored in `hearth.toml` at the project root.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration from hearth.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Runtime settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeSection>,

    /// Script inclusion settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<IncludeSection>,
}

/// `[runtime]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct RuntimeSection {
    /// Root directory compiled scripts are registered relative to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Working directory of a run (default: the project root)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Server API name exposed to scripts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_api: Option<String>,
}

/// `[include]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct IncludeSection {
    /// Directories searched for relative inclusions, in order
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

impl ProjectConfig {
    /// Load project configuration from a file
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

    /// Validate the project configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(runtime) = &self.runtime {
            if let Some(api) = &runtime.server_api {
                validate_server_api("runtime.server-api", api)?;
            }
            if let Some(root) = &runtime.root {
                if root.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidPath(root.clone()));
                }
            }
        }

        if let Some(include) = &self.include {
            if let Some(empty) = include.paths.iter().find(|p| p.as_os_str().is_empty()) {
                return Err(ConfigError::InvalidPath(empty.clone()));
            }
        }

        Ok(())
    }

    /// Configured script root, if any
    pub fn root(&self) -> Option<&Path> {
        self.runtime.as_ref().and_then(|r| r.root.as_deref())
    }

    /// Configured working directory, if any
    pub fn working_dir(&self) -> Option<&Path> {
        self.runtime.as_ref().and_then(|r| r.working_dir.as_deref())
    }

    /// Configured server API name, if any
    pub fn server_api(&self) -> Option<&str> {
        self.runtime.as_ref().and_then(|r| r.server_api.as_deref())
    }

    /// Configured include paths (empty when unset)
    pub fn include_paths(&self) -> &[PathBuf] {
        self.include
            .as_ref()
            .map(|i| i.paths.as_slice())
            .unwrap_or(&[])
    }

    /// Merge another project config into this one
    /// Other config takes precedence for non-None values
    pub fn merge(&mut self, other: &ProjectConfig) {
        if other.runtime.is_some() {
            self.runtime = other.runtime.clone();
        }
        if other.include.is_some() {
            self.include = other.include.clone();
        }
    }
}

/// Server API names are short identifiers (`cli`, `fpm-fcgi`, ...)
pub(crate) fn validate_server_api(field: &str, value: &str) -> ConfigResult<()> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a valid server API name", value),
        });
    }
    Ok(())
}

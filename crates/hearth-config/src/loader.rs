//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{validate_server_api, IncludeSection, ProjectConfig};
use crate::{ConfigError, ConfigResult, DEFAULT_SERVER_API, PROJECT_CONFIG_FILE};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.hearth/config.toml) - lowest priority
/// 2. Project config (./hearth.toml) - overrides global
/// 3. Environment variables (HEARTH_*) - overrides project
/// 4. Host options - highest priority (handled by caller)
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration (environment overrides applied)
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where hearth.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Create a loader that reads global configuration from an explicit file
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find hearth.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        let global_config = self.load_global_config().unwrap_or_default();

        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config().unwrap_or_default();
        let project_config = self.apply_env_overrides(project_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); no file found is not an error
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.hearth/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        // Global config is optional
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to project config
    ///
    /// - `HEARTH_SERVER_API`: server API name
    /// - `HEARTH_ROOT`: script root directory
    /// - `HEARTH_INCLUDE_PATH`: include paths, joined with the platform path separator
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(api) = env::var("HEARTH_SERVER_API") {
            validate_server_api("HEARTH_SERVER_API", &api)?;
            config.runtime.get_or_insert_with(Default::default).server_api = Some(api);
        }

        if let Some(root) = env::var_os("HEARTH_ROOT") {
            if root.is_empty() {
                return Err(ConfigError::InvalidPath(PathBuf::from(root)));
            }
            config.runtime.get_or_insert_with(Default::default).root = Some(PathBuf::from(root));
        }

        if let Some(paths) = env::var_os("HEARTH_INCLUDE_PATH") {
            let paths = env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            config.include = Some(IncludeSection { paths });
        }

        Ok(config)
    }

    /// Get the global configuration directory (~/.hearth)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".hearth"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Get the effective server API name (project > global > default)
    pub fn server_api(&self) -> &str {
        self.project
            .server_api()
            .or_else(|| self.global.server_api())
            .unwrap_or(DEFAULT_SERVER_API)
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has hearth.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Effective script root: `[runtime] root` relative to the project root,
    /// else the project root itself
    pub fn script_root(&self) -> Option<PathBuf> {
        match (self.project.root(), self.project_root()) {
            (Some(root), Some(base)) => Some(base.join(root)),
            (Some(root), None) => Some(root.to_path_buf()),
            (None, base) => base.map(Path::to_path_buf),
        }
    }

    /// Effective working directory, relative entries taken from the project root
    pub fn working_dir(&self) -> Option<PathBuf> {
        match (self.project.working_dir(), self.project_root()) {
            (Some(dir), Some(base)) => Some(base.join(dir)),
            (Some(dir), None) => Some(dir.to_path_buf()),
            (None, _) => self.script_root(),
        }
    }

    /// Effective include paths: project paths first, then global defaults
    pub fn include_paths(&self) -> Vec<PathBuf> {
        let base = self.project_root();
        self.project
            .include_paths()
            .iter()
            .map(|p| match base {
                Some(base) if p.is_relative() => base.join(p),
                _ => p.clone(),
            })
            .chain(self.global.include_paths().iter().cloned())
            .collect()
    }
}

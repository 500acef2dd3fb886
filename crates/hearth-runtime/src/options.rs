//! Per-run options
//!
//! Usually derived from a loaded [`hearth_config::Config`]; hosts may
//! override individual fields afterwards.

use hearth_config::{Config, DEFAULT_SERVER_API};
use std::path::PathBuf;

/// Directory and identity settings of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeOptions {
    /// Directory compiled scripts are registered relative to
    pub root: PathBuf,
    /// Directories searched for relative inclusions, in order
    pub include_paths: Vec<PathBuf>,
    /// Working directory of the run
    pub working_dir: PathBuf,
    /// Value of the `SERVER_API` constant
    pub server_api: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            include_paths: Vec::new(),
            working_dir: PathBuf::from("/"),
            server_api: DEFAULT_SERVER_API.to_string(),
        }
    }
}

impl RuntimeOptions {
    /// Options rooted at `root`, with the working directory at the root
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            working_dir: root.clone(),
            root,
            ..Self::default()
        }
    }

    /// Build options from merged configuration.
    ///
    /// Without a project, the root and working directory default to `/`.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        let root = config.script_root().unwrap_or(defaults.root);
        let working_dir = config.working_dir().unwrap_or_else(|| root.clone());

        Self {
            root,
            include_paths: config.include_paths(),
            working_dir,
            server_api: config.server_api().to_string(),
        }
    }

    pub fn include_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn server_api(mut self, name: impl Into<String>) -> Self {
        self.server_api = name.into();
        self
    }
}

//! Configuration handling for promptsync
//!
//! Configuration is stored in `.promptsync/config.toml` (project) and
//! `~/.config/promptsync/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the per-project state directory
pub const PROJECT_DIR: &str = ".promptsync";

/// Overrides the root used for system-wide adapter files
pub const SYSTEM_ROOT_ENV: &str = "PROMPTSYNC_SYSTEM_ROOT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Adapters used by `generate`/`sync` when none are given (empty = every
    /// adapter able to perform the operation)
    pub adapters: Vec<String>,

    /// Canonical document file, relative to `.promptsync/`
    pub source: String,

    /// Local variable file, relative to `.promptsync/`
    pub local_variables: String,

    /// Root for system-wide adapter files (default: home directory)
    pub system_root: Option<PathBuf>,

    /// Write `.promptsync/generation.json` after generating
    pub record_generation: bool,

    /// Run adapters on worker threads when generating for several
    pub parallel: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            adapters: Vec::new(),
            source: "prompt.yaml".to_string(),
            local_variables: "variables.local.yaml".to_string(),
            system_root: None,
            record_generation: true,
            parallel: true,
        }
    }
}

impl ProjectConfig {
    /// Rejects adapter names that are not in `known`
    pub fn validate(&self, known: &[&str]) -> Result<(), ConfigError> {
        let unknown: Vec<_> = self
            .adapters
            .iter()
            .filter(|name| !known.contains(&name.as_str()))
            .cloned()
            .collect();

        if !unknown.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "unknown adapters: {} (known: {})",
                unknown.join(", "),
                known.join(", ")
            )));
        }
        if self.source.trim().is_empty() {
            return Err(ConfigError::Invalid("source must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Root for system-wide adapter files
    pub system_root: Option<PathBuf>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let project_root = Self::find_project_root();
        let project = match &project_root {
            Some(root) => Self::load_project_config(root)?,
            None => ProjectConfig::default(),
        };

        Ok(Self {
            project,
            global,
            project_root,
        })
    }

    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "promptsync", "promptsync").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(PROJECT_DIR).join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")
    }

    /// Finds the project root by looking for `.promptsync/` from the
    /// current directory upwards
    pub fn find_project_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_project_root_from(&current)
    }

    /// Finds the project root by looking for `.promptsync/` from `start` upwards
    pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns the project root, or an error if not in a project
    pub fn require_project_root(&self) -> Result<&Path> {
        self.project_root
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not in a promptsync project. Run 'promptsync init' first."))
    }

    /// Root for system-wide adapter files: environment, then project, then
    /// global configuration. `None` means the user's home directory.
    pub fn system_root(&self) -> Option<PathBuf> {
        std::env::var_os(SYSTEM_ROOT_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| self.project.system_root.clone())
            .or_else(|| self.global.system_root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = ProjectConfig::default();

        assert!(config.adapters.is_empty());
        assert_eq!(config.source, "prompt.yaml");
        assert_eq!(config.local_variables, "variables.local.yaml");
        assert!(config.record_generation);
        assert!(config.parallel);
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
adapters = ["cursor", "claude"]
source = "universal.yaml"
parallel = false
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.adapters, vec!["cursor", "claude"]);
        assert_eq!(config.source, "universal.yaml");
        assert!(!config.parallel);
        assert!(config.record_generation);
    }

    #[test]
    fn parse_global_config() {
        let toml = r#"
default_format = "json"
system_root = "/tmp/home"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
        assert_eq!(config.system_root, Some(PathBuf::from("/tmp/home")));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();
        fs::write(dir.path().join(PROJECT_DIR).join("config.toml"), "adapters = [").unwrap();

        assert!(Config::for_project(dir.path()).is_err());
    }

    #[test]
    fn validate_rejects_unknown_adapters() {
        let config = ProjectConfig {
            adapters: vec!["cursor".to_string(), "vim".to_string()],
            ..ProjectConfig::default()
        };

        let err = config.validate(&["cursor", "claude"]).unwrap_err();
        assert!(err.to_string().contains("vim"));
        assert!(ProjectConfig::default().validate(&["cursor"]).is_ok());
    }

    #[test]
    fn find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(PROJECT_DIR)).unwrap();
        let sub_dir = dir.path().join("sub").join("dir");
        fs::create_dir_all(&sub_dir).unwrap();

        let root = Config::find_project_root_from(&sub_dir);
        assert_eq!(root.as_deref(), Some(dir.path()));
    }

    #[test]
    fn not_in_project() {
        let config = Config {
            project: ProjectConfig::default(),
            global: GlobalConfig::default(),
            project_root: None,
        };

        assert!(config.require_project_root().is_err());
    }

    #[test]
    fn project_system_root_beats_global() {
        let config = Config {
            project: ProjectConfig {
                system_root: Some(PathBuf::from("/project-home")),
                ..ProjectConfig::default()
            },
            global: GlobalConfig {
                system_root: Some(PathBuf::from("/global-home")),
                ..GlobalConfig::default()
            },
            project_root: None,
        };

        if std::env::var_os(SYSTEM_ROOT_ENV).is_none() {
            assert_eq!(config.system_root(), Some(PathBuf::from("/project-home")));
        }
    }
}

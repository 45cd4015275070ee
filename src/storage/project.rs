//! Project management
//!
//! Handles project initialization and provides access to stores.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::domain::CanonicalDocument;

use super::config::PROJECT_DIR;
use super::{Config, GenerationRecord, LocalVariables, SourceStore};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a promptsync project. Run 'promptsync init' first.")]
    NotInProject,
}

const DEFAULT_CONFIG: &str = r#"# promptsync configuration

# Adapters used when --adapter is not given (empty = all)
adapters = []

# Canonical document, relative to .promptsync/
source = "prompt.yaml"

# Machine-local variable values, relative to .promptsync/
local_variables = "variables.local.yaml"

# Record checksums of generated files for 'promptsync status'
record_generation = true

# Generate for several adapters on worker threads
parallel = true
"#;

const GITIGNORE: &str = r#"# Machine-local variable values
variables.local.yaml

# Lock files
.*.lock
"#;

/// A promptsync project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(PROJECT_DIR).is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a project at the given path with a starter document
    /// titled after the directory. Existing files are left alone.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let project_dir = root.join(PROJECT_DIR);

        fs::create_dir_all(&project_dir).with_context(|| {
            format!("Failed to create {} directory: {}", PROJECT_DIR, project_dir.display())
        })?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = project_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        let project = Self::open(root)?;
        let store = project.source_store();
        if !store.exists() {
            store.save(&project.starter_document())?;
        }

        tracing::debug!(root = %project.root.display(), "initialized project");
        Ok(project)
    }

    fn starter_document(&self) -> CanonicalDocument {
        let title = fs::canonicalize(&self.root)
            .ok()
            .and_then(|root| root.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "Project".to_string());

        let mut doc = CanonicalDocument::new(
            title,
            "Describe coding standards and conventions here.\n\nAlways respond in {{LANGUAGE}}.",
        );
        doc.metadata.description = "Instructions for AI coding assistants".to_string();
        doc.variables.insert("LANGUAGE", "English");
        doc
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .promptsync directory path
    pub fn project_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the canonical document store
    pub fn source_store(&self) -> SourceStore {
        SourceStore::for_project(&self.root, &self.config.project)
    }

    /// Returns the local variable file
    pub fn local_variables(&self) -> LocalVariables {
        LocalVariables::for_project(&self.root, &self.config.project)
    }

    /// Returns the last generation record, if any
    pub fn generation_record(&self) -> Result<Option<GenerationRecord>> {
        GenerationRecord::load(&self.root)
    }

    /// Converts an absolute path to a path relative to the project root
    pub fn relative_path<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

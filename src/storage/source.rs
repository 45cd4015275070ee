//! Canonical document and local variable files
//!
//! The canonical document lives in `.promptsync/prompt.yaml` (configurable).
//! Readers take a shared lock and writers an exclusive lock on a sidecar
//! `.{name}.lock` file, since the document itself is replaced by rename.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use thiserror::Error;

use crate::domain::{is_valid_name, CanonicalDocument, DocumentNote, VariableTable};

use super::config::{ProjectConfig, PROJECT_DIR};
use super::writer::write_atomic;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No canonical document at {0}. Run 'promptsync init' or 'promptsync sync' first.")]
    Missing(PathBuf),

    #[error("Invalid canonical document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid local variables {path}: {reason}")]
    Variables { path: PathBuf, reason: String },
}

/// A loaded document plus notes for fields dropped as illegal
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub document: CanonicalDocument,
    pub notes: Vec<DocumentNote>,
}

/// Store for the canonical YAML document
pub struct SourceStore {
    path: PathBuf,
}

impl SourceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the configured store for a project
    pub fn for_project(project_root: &Path, config: &ProjectConfig) -> Self {
        Self::new(project_root.join(PROJECT_DIR).join(&config.source))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn lock_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!(".{}.lock", name))
    }

    fn open_lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let lock_path = self.lock_path();
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))
    }

    /// Reads the document, or `None` if the file does not exist yet
    pub fn load(&self) -> Result<Option<LoadedSource>> {
        if !self.exists() {
            return Ok(None);
        }

        let lock = self.open_lock()?;
        lock.lock_shared()
            .context("Failed to acquire read lock on canonical document")?;

        let text = fs::read_to_string(&self.path);
        let _ = lock.unlock();

        let text = text
            .with_context(|| format!("Failed to read canonical document: {}", self.path.display()))?;

        let (document, notes) =
            CanonicalDocument::from_yaml(&text).map_err(|source| SourceError::Parse {
                path: self.path.clone(),
                source,
            })?;

        for note in &notes {
            tracing::warn!(path = %self.path.display(), %note, "dropped field on load");
        }

        Ok(Some(LoadedSource { document, notes }))
    }

    /// Reads the document, failing if it does not exist
    pub fn require(&self) -> Result<LoadedSource> {
        self.load()?
            .ok_or_else(|| SourceError::Missing(self.path.clone()).into())
    }

    /// Writes the document atomically under an exclusive lock
    pub fn save(&self, document: &CanonicalDocument) -> Result<()> {
        let yaml = document
            .to_yaml()
            .context("Failed to serialize canonical document")?;

        let lock = self.open_lock()?;
        lock.lock_exclusive()
            .context("Failed to acquire write lock on canonical document")?;

        let written = write_atomic(&self.path, yaml.as_bytes());
        let _ = lock.unlock();

        written.with_context(|| format!("Failed to write canonical document: {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), version = %document.schema_version, "saved");
        Ok(())
    }
}

/// Machine-local variable values, kept out of version control
pub struct LocalVariables {
    path: PathBuf,
}

impl LocalVariables {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_project(project_root: &Path, config: &ProjectConfig) -> Self {
        Self::new(project_root.join(PROJECT_DIR).join(&config.local_variables))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the variable table; a missing file is an empty table
    pub fn load(&self) -> Result<VariableTable> {
        if !self.path.exists() {
            return Ok(VariableTable::new());
        }

        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read local variables: {}", self.path.display()))?;

        let table: VariableTable = serde_yaml::from_str(&text).map_err(|e| SourceError::Variables {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        if let Some((name, _)) = table.iter().find(|(name, _)| !is_valid_name(name)) {
            return Err(SourceError::Variables {
                path: self.path.clone(),
                reason: format!("invalid variable name '{}'", name),
            }
            .into());
        }

        Ok(table)
    }
}

//! Last-generation record (`.promptsync/generation.json`)
//!
//! Written after `generate`, read by `status` to find native files that were
//! edited by hand or deleted since they were generated. The next `generate`
//! uses it to remove files an adapter no longer produces.
//!
//! ```json
//! {
//!   "documentVersion": "1.0.0",
//!   "schemaVersion": "3.1",
//!   "generatedAt": "2026-01-01T00:00:00Z",
//!   "sourceChecksum": "af13...",
//!   "variables": { "PROJECT_NAME": "Acme" },
//!   "adapters": {
//!     "cursor": [{ "path": ".cursor/rules/main.mdc", "checksum": "9b2c..." }]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CanonicalDocument, SchemaVersion};
use crate::engine::Generated;

use super::config::PROJECT_DIR;
use super::writer::write_atomic;

const RECORD_FILE: &str = "generation.json";

/// Hex blake3 digest of file contents
pub fn checksum(contents: &[u8]) -> String {
    blake3::hash(contents).to_hex().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Relative to the project root when inside it, absolute otherwise
    pub path: PathBuf,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub document_version: String,
    pub schema_version: SchemaVersion,
    pub generated_at: DateTime<Utc>,

    /// Checksum of the canonical document file the output came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_checksum: Option<String>,

    /// Builtin and document values used for the most recent run
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    #[serde(default)]
    pub adapters: BTreeMap<String, Vec<GeneratedFile>>,
}

/// Drift of one adapter's files against the record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdapterDrift {
    pub adapter: String,
    pub unchanged: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
}

impl AdapterDrift {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.missing.is_empty()
    }
}

/// Files from an earlier run that an adapter no longer produces
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pruned {
    pub removed: Vec<PathBuf>,

    /// Edited by hand since they were generated, so left in place
    pub kept: Vec<PathBuf>,
}

impl Pruned {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.kept.is_empty()
    }
}

impl GenerationRecord {
    /// Starts a record for a run, keeping entries for adapters that are not
    /// regenerated this time
    pub fn begin(
        previous: Option<GenerationRecord>,
        doc: &CanonicalDocument,
        source_checksum: Option<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            document_version: doc.metadata.version.clone(),
            schema_version: doc.schema_version,
            generated_at,
            source_checksum,
            variables: BTreeMap::new(),
            adapters: previous.map(|p| p.adapters).unwrap_or_default(),
        }
    }

    fn path(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join(RECORD_FILE)
    }

    pub fn load(project_root: &Path) -> Result<Option<Self>> {
        let path = Self::path(project_root);
        if !path.exists() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read generation record: {}", path.display()))?;
        let record = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse generation record: {}", path.display()))?;
        Ok(Some(record))
    }

    pub fn save(&self, project_root: &Path) -> Result<()> {
        let path = Self::path(project_root);
        let mut json = serde_json::to_string_pretty(self).context("Failed to serialize generation record")?;
        json.push('\n');

        write_atomic(&path, json.as_bytes())
            .with_context(|| format!("Failed to write generation record: {}", path.display()))
    }

    /// Adds the files written by one adapter, hashing them as they are on disk
    pub fn record(&mut self, generated: &Generated, project_root: &Path) -> Result<()> {
        let mut files = Vec::with_capacity(generated.files.len());

        for path in &generated.files {
            let contents = fs::read(path)
                .with_context(|| format!("Failed to read generated file: {}", path.display()))?;
            let stored = path.strip_prefix(project_root).unwrap_or(path.as_path()).to_path_buf();
            files.push(GeneratedFile {
                path: stored,
                checksum: checksum(&contents),
            });
        }

        self.variables = generated.bindings.snapshot();
        self.adapters.insert(generated.adapter.clone(), files);
        Ok(())
    }

    /// Deletes files recorded for `generated.adapter` that this run did not
    /// write. Must run before [`GenerationRecord::record`] replaces the
    /// adapter's entry. Only files under the adapter's root whose checksum
    /// still matches are removed.
    pub fn prune(&self, generated: &Generated, project_root: &Path) -> Result<Pruned> {
        let mut pruned = Pruned::default();
        let Some(files) = self.adapters.get(&generated.adapter) else {
            return Ok(pruned);
        };

        for file in files {
            let path = project_root.join(&file.path);
            if generated.files.contains(&path) || !path.starts_with(&generated.root) {
                continue;
            }

            match fs::read(&path) {
                Ok(contents) if checksum(&contents) == file.checksum => {
                    fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove stale file: {}", path.display()))?;
                    tracing::debug!(adapter = %generated.adapter, path = %path.display(), "pruned");
                    pruned.removed.push(file.path.clone());
                }
                Ok(_) => {
                    tracing::warn!(adapter = %generated.adapter, path = %path.display(), "stale file was edited; keeping it");
                    pruned.kept.push(file.path.clone());
                }
                Err(_) => {}
            }
        }

        Ok(pruned)
    }

    /// Compares recorded checksums with the files currently on disk
    pub fn status(&self, project_root: &Path) -> Vec<AdapterDrift> {
        self.adapters
            .iter()
            .map(|(adapter, files)| {
                let mut drift = AdapterDrift {
                    adapter: adapter.clone(),
                    ..AdapterDrift::default()
                };

                for file in files {
                    match fs::read(project_root.join(&file.path)) {
                        Ok(contents) if checksum(&contents) == file.checksum => {
                            drift.unchanged.push(file.path.clone())
                        }
                        Ok(_) => drift.modified.push(file.path.clone()),
                        Err(_) => drift.missing.push(file.path.clone()),
                    }
                }

                drift
            })
            .collect()
    }

    /// True if the canonical document changed since this record was written
    pub fn source_changed(&self, source: &[u8]) -> bool {
        self.source_checksum
            .as_deref()
            .is_some_and(|recorded| recorded != checksum(source))
    }
}

//! # Format Adapters
//!
//! One adapter per target tool. Each declares what it can do and implements
//! format-specific encoding (canonical document → native files) and, where
//! the format allows, decoding (native files → candidate document).
//!
//! ## Built-in Adapters
//!
//! | Name | Files | Generate | Parse | Scope |
//! |------|-------|----------|-------|-------|
//! | `agents-md` | `AGENTS.md` | ✓ | ✓ | project |
//! | `windsurf` | `.windsurfrules` | ✓ | ✓ | project |
//! | `cursor` | `.cursor/rules/*.mdc` | ✓ | ✓ | project |
//! | `claude` | `CLAUDE.md`, `.claude/commands/*.md`, `.claude/agents/*.md` | ✓ | ✓ | project |
//! | `continue` | `.continue/config.json` | ✓ | ✓ | project |
//! | `windsurf-global` | `.codeium/windsurf/memories/global_rules.md` | ✓ | | system-wide |
//!
//! Adapters never mutate the document they encode, never read existing
//! target files while encoding, and always return decoded documents at the
//! latest schema version with an empty variable table. Reconciling a decoded
//! document with the existing one is the merge engine's job.

mod claude;
mod continue_config;
mod cursor_rules;
mod frontmatter;
mod global_rules;
mod markdown_file;
mod sections;

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Bindings, CanonicalDocument, ListMerge};

pub use claude::ClaudeAdapter;
pub use continue_config::ContinueAdapter;
pub use cursor_rules::CursorRulesAdapter;
pub use global_rules::WindsurfGlobalAdapter;
pub use markdown_file::MarkdownFileAdapter;

/// Where an adapter's files live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FileScope {
    /// Relative to the project directory
    Project,

    /// Relative to the user's home (or configured system root)
    SystemWide,

    /// The adapter writes no files
    None,
}

impl fmt::Display for FileScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileScope::Project => write!(f, "project"),
            FileScope::SystemWide => write!(f, "system-wide"),
            FileScope::None => write!(f, "none"),
        }
    }
}

/// Static description of what an adapter supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterCapabilitySet {
    pub supports_generate: bool,
    pub supports_parse: bool,
    pub file_location_scope: FileScope,
}

impl AdapterCapabilitySet {
    /// Generate and parse, project scope
    pub const fn bidirectional() -> Self {
        Self {
            supports_generate: true,
            supports_parse: true,
            file_location_scope: FileScope::Project,
        }
    }

    /// Generate only, system-wide scope
    pub const fn system_wide_generate_only() -> Self {
        Self {
            supports_generate: true,
            supports_parse: false,
            file_location_scope: FileScope::SystemWide,
        }
    }
}

/// A file an adapter wants written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    /// Path relative to the adapter's root directory
    pub path: PathBuf,
    pub contents: String,
}

impl FileWrite {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{adapter}: no native files found at {}", path.display())]
    NotFound { adapter: String, path: PathBuf },

    #[error("{adapter}: cannot parse {}: {reason}", path.display())]
    Malformed {
        adapter: String,
        path: PathBuf,
        reason: String,
    },

    #[error("{adapter}: parsing native files is not supported")]
    Unsupported { adapter: String },
}

impl DecodeError {
    pub fn malformed(adapter: &str, path: &Path, reason: impl fmt::Display) -> Self {
        DecodeError::Malformed {
            adapter: adapter.to_string(),
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DecodeError::NotFound { .. })
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{adapter}: failed to write {}: {source}", path.display())]
    WriteFailure {
        adapter: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{adapter}: failed to render: {reason}")]
    Render { adapter: String, reason: String },
}

impl EncodeError {
    pub fn render(adapter: &str, reason: impl fmt::Display) -> Self {
        EncodeError::Render {
            adapter: adapter.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A format-specific encoder/decoder pair for one target tool
pub trait FormatAdapter: Send + Sync {
    /// Registry name (e.g. `cursor`)
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> AdapterCapabilitySet;

    /// How decoded instruction text combines with the existing document
    fn merge_policy(&self) -> ListMerge {
        ListMerge::Replace
    }

    /// Paths (relative to the adapter root) this adapter writes or reads,
    /// for display only
    fn locations(&self) -> Vec<String>;

    /// Renders the document into native files. Deterministic for identical
    /// inputs and never touches the filesystem.
    fn encode(&self, doc: &CanonicalDocument, bindings: &Bindings) -> Result<Vec<FileWrite>, EncodeError>;

    /// Reads native files under `source_dir` back into a candidate document
    fn decode(&self, _source_dir: &Path) -> Result<CanonicalDocument, DecodeError> {
        Err(DecodeError::Unsupported {
            adapter: self.name().to_string(),
        })
    }
}

/// Lookup table of adapters by name
pub struct AdapterRegistry {
    adapters: Vec<Box<dyn FormatAdapter>>,
}

impl AdapterRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self { adapters: Vec::new() }
    }

    /// All built-in adapters
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MarkdownFileAdapter::agents_md()));
        registry.register(Box::new(MarkdownFileAdapter::windsurf()));
        registry.register(Box::new(CursorRulesAdapter));
        registry.register(Box::new(ClaudeAdapter));
        registry.register(Box::new(ContinueAdapter));
        registry.register(Box::new(WindsurfGlobalAdapter));
        registry
    }

    /// Adds an adapter, replacing any existing adapter with the same name
    pub fn register(&mut self, adapter: Box<dyn FormatAdapter>) {
        self.adapters.retain(|a| a.name() != adapter.name());
        self.adapters.push(adapter);
    }

    pub fn get(&self, name: &str) -> Option<&dyn FormatAdapter> {
        self.adapters
            .iter()
            .find(|a| a.name() == name)
            .map(|a| a.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn FormatAdapter> {
        self.adapters.iter().map(|a| a.as_ref())
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lowercase, hyphen-separated file stem for a display name
pub(crate) fn slugify(input: &str) -> String {
    let mut normalized = String::new();
    let mut last_dash = false;

    for ch in input.chars() {
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_alphanumeric() || lower == '_' {
            normalized.push(lower);
            last_dash = false;
        } else if !last_dash {
            normalized.push('-');
            last_dash = true;
        }
    }

    normalized.trim_matches('-').to_string()
}

/// Slugs for a list of names, made unique by numeric suffixes. `reserved`
/// stems are never handed out.
pub(crate) fn unique_slugs<'a>(names: impl IntoIterator<Item = &'a str>, reserved: &[&str]) -> Vec<String> {
    let mut taken: Vec<String> = reserved.iter().map(|s| s.to_string()).collect();
    let mut slugs = Vec::new();

    for name in names {
        let base = match slugify(name) {
            s if s.is_empty() => "untitled".to_string(),
            s => s,
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        taken.push(candidate.clone());
        slugs.push(candidate);
    }

    slugs
}

/// Reads a native file as UTF-8. Missing files yield `Ok(None)`.
pub(crate) fn read_native(adapter: &str, path: &Path) -> Result<Option<String>, DecodeError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text.replace("\r\n", "\n"))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DecodeError::malformed(adapter, path, e)),
    }
}

/// Sorted paths of files in `dir` with the given extension. A missing
/// directory yields an empty list.
pub(crate) fn list_files(adapter: &str, dir: &Path, extension: &str) -> Result<Vec<PathBuf>, DecodeError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DecodeError::malformed(adapter, dir, e)),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DecodeError::malformed(adapter, dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|e| e == extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// File stem as a string, used as an entry name when nothing better exists
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

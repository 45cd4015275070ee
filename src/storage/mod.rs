//! # Storage Layer
//!
//! Persistence for promptsync projects.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Canonical document | YAML | `.promptsync/prompt.yaml` |
//! | Local variables | YAML mapping | `.promptsync/variables.local.yaml` |
//! | Generation record | JSON | `.promptsync/generation.json` |
//! | Config | TOML | `.promptsync/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`SourceStore`] uses file locking (`fs2`) on a sidecar lock file
//! - All writes, including adapter output, are atomic (temp file + rename)
//!
//! ## Project Structure
//!
//! ```text
//! .promptsync/
//! ├── prompt.yaml            # Canonical document
//! ├── variables.local.yaml   # Machine-local variable values (ignored)
//! ├── generation.json        # Checksums of the last generated files
//! ├── config.toml            # Project configuration
//! └── .gitignore
//! ```

mod config;
mod generation;
mod project;
mod source;
mod writer;

pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig, PROJECT_DIR, SYSTEM_ROOT_ENV};
pub use generation::{checksum, AdapterDrift, GeneratedFile, GenerationRecord, Pruned};
pub use project::{Project, ProjectError};
pub use source::{LoadedSource, LocalVariables, SourceError, SourceStore};
pub use writer::write_atomic;

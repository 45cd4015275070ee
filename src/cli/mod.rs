//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Commands
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `init` | Create `.promptsync/` with config and a starter document |
//! | `generate` | Canonical document → native files |
//! | `sync` | Native files → canonical document |
//! | `migrate` | Upgrade the document's schema version |
//! | `adapters` | List adapters and capabilities |
//! | `status` | Drift since the last generation |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output:
//! ```bash
//! promptsync --verbose sync
//! ```
//!
//! `RUST_LOG` overrides the log filter.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod adapter_cmd;
mod app;
mod generate;
mod migrate_cmd;
mod output;
mod status;
mod sync_cmd;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};

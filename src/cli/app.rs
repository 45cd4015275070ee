//! Main CLI application structure

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{adapter_cmd, generate, migrate_cmd, status, sync_cmd};
use crate::adapter::FileScope;
use crate::engine::Engine;
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "promptsync")]
#[command(author, version, about = "Keep one canonical AI-assistant prompt in sync with editor-native rule files")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new promptsync project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Write native files from the canonical document
    Generate {
        /// Adapter to generate for (repeatable; defaults to config, then all project adapters)
        #[arg(long = "adapter", short = 'a')]
        adapters: Vec<String>,

        /// Variable override as NAME=VALUE (repeatable)
        #[arg(long = "var")]
        vars: Vec<String>,

        /// Directory to write project files into (defaults to the project root)
        #[arg(long)]
        target: Option<PathBuf>,
    },

    /// Merge edited native files back into the canonical document
    Sync {
        /// Adapter to read from (repeatable; defaults to config, then all parseable adapters)
        #[arg(long = "adapter", short = 'a')]
        adapters: Vec<String>,

        /// Directory to read native files from (defaults to the project root)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Show what would change without writing the canonical document
        #[arg(long)]
        dry_run: bool,
    },

    /// Upgrade the canonical document to a newer schema version
    Migrate {
        /// Target schema version (defaults to the latest)
        #[arg(long)]
        to: Option<String>,

        /// Preview without writing the canonical document
        #[arg(long)]
        dry_run: bool,
    },

    /// List available adapters and their capabilities
    Adapters,

    /// Show drift between generated files and what is on disk
    Status,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = match cli.format {
        Some(format) => format,
        None => Config::load()
            .map(|config| OutputFormat::from(config.global.default_format))
            .unwrap_or_default(),
    };
    let output = Output::new(format, cli.verbose);

    output.verbose("promptsync starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!("Created canonical document at: {}", project.source_store().path().display()),
            );
            output.success(&format!("Initialized promptsync project at {}", project.root().display()));
        }

        Commands::Generate { adapters, vars, target } => generate::run(&output, &adapters, &vars, target)?,

        Commands::Sync { adapters, source, dry_run } => sync_cmd::run(&output, &adapters, source, dry_run)?,

        Commands::Migrate { to, dry_run } => migrate_cmd::run(&output, to.as_deref(), dry_run)?,

        Commands::Adapters => adapter_cmd::list(&output)?,

        Commands::Status => {
            output.verbose("Comparing generated files with the last generation record");
            status::run(&output)?
        }
    }

    Ok(())
}

/// Builds an engine configured for the project
pub(super) fn engine_for(project: &Project) -> Result<Engine> {
    let config = project.config();
    let engine = Engine::default().with_parallel(config.project.parallel);
    config.project.validate(&engine.registry().names())?;

    Ok(match config.system_root() {
        Some(root) => engine.with_system_root(root),
        None => engine,
    })
}

/// Which adapter an operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Operation {
    Generate,
    Parse,
}

/// Picks adapters: explicit names, then the configured list, then every
/// project-scoped adapter that supports the operation. System-wide adapters
/// only run when named.
pub(super) fn select_adapters(
    engine: &Engine,
    requested: &[String],
    configured: &[String],
    operation: Operation,
) -> Result<Vec<String>> {
    let known = engine.registry().names();

    let explicit = if requested.is_empty() { configured } else { requested };
    if !explicit.is_empty() {
        let unknown: Vec<_> = explicit
            .iter()
            .filter(|name| !known.contains(&name.as_str()))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            bail!(
                "Unknown adapter(s): {}. Available: {}",
                unknown.join(", "),
                known.join(", ")
            );
        }
        return Ok(explicit.to_vec());
    }

    Ok(engine
        .registry()
        .iter()
        .filter(|adapter| {
            let caps = adapter.capabilities();
            let supported = match operation {
                Operation::Generate => caps.supports_generate,
                Operation::Parse => caps.supports_parse,
            };
            supported && caps.file_location_scope == FileScope::Project
        })
        .map(|adapter| adapter.name().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cli_parses_repeated_flags() {
        let cli = Cli::try_parse_from([
            "promptsync", "generate", "-a", "cursor", "--adapter", "claude", "--var", "A=1", "--var", "B=2",
        ])
        .unwrap();

        match cli.command {
            Commands::Generate { adapters, vars, target } => {
                assert_eq!(adapters, names(&["cursor", "claude"]));
                assert_eq!(vars, names(&["A=1", "B=2"]));
                assert!(target.is_none());
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn explicit_adapters_win_over_config() {
        let engine = Engine::default();
        let selected =
            select_adapters(&engine, &names(&["claude"]), &names(&["cursor"]), Operation::Generate).unwrap();
        assert_eq!(selected, names(&["claude"]));

        let selected = select_adapters(&engine, &[], &names(&["cursor"]), Operation::Generate).unwrap();
        assert_eq!(selected, names(&["cursor"]));
    }

    #[test]
    fn default_selection_skips_system_wide_adapters() {
        let engine = Engine::default();

        let generate = select_adapters(&engine, &[], &[], Operation::Generate).unwrap();
        assert!(generate.contains(&"cursor".to_string()));
        assert!(!generate.contains(&"windsurf-global".to_string()));

        let parse = select_adapters(&engine, &[], &[], Operation::Parse).unwrap();
        assert!(!parse.contains(&"windsurf-global".to_string()));
        assert!(parse.contains(&"continue".to_string()));
    }

    #[test]
    fn unknown_adapter_is_an_error() {
        let engine = Engine::default();
        let err = select_adapters(&engine, &names(&["vim"]), &[], Operation::Parse).unwrap_err();
        assert!(err.to_string().contains("vim"));
    }
}

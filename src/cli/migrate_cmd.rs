//! Migrate command

use anyhow::{anyhow, Result};

use super::app::engine_for;
use super::output::Output;
use crate::domain::SchemaVersion;
use crate::storage::Project;

/// Upgrades the canonical document to `to` (or the latest schema)
pub fn run(output: &Output, to: Option<&str>, dry_run: bool) -> Result<()> {
    let project = Project::open_current()?;
    let engine = engine_for(&project)?;

    let target = match to {
        Some(version) => version.parse::<SchemaVersion>().map_err(|e| anyhow!(e))?,
        None => SchemaVersion::LATEST,
    };

    let store = project.source_store();
    let loaded = store.require()?;
    let from = loaded.document.schema_version;
    output.verbose_ctx("migrate", &format!("Document is at schema {}, target {}", from, target));

    if from == target {
        output.success(&format!("Already at schema {}", target));
        return Ok(());
    }

    let migrated = engine.migrate(loaded.document, target)?;
    let notes: Vec<String> = loaded
        .notes
        .iter()
        .chain(migrated.notes.iter())
        .map(|n| n.to_string())
        .collect();

    if !dry_run {
        store.save(&migrated.document)?;
    }

    if output.is_json() {
        output.data(&serde_json::json!({
            "success": true,
            "from": from,
            "to": target,
            "dryRun": dry_run,
            "warnings": notes,
        }));
    } else {
        for note in &notes {
            output.warning(note);
        }
        if dry_run {
            println!("Dry run: would migrate schema {} -> {}", from, target);
            print!("{}", migrated.document.to_yaml()?);
        } else {
            println!("Migrated schema {} -> {}", from, target);
        }
    }

    Ok(())
}

//! Status command

use std::fs;

use anyhow::Result;

use super::output::Output;
use crate::domain::SchemaVersion;
use crate::storage::Project;

/// Reports drift between the last generation and the files on disk
pub fn run(output: &Output) -> Result<()> {
    let project = Project::open_current()?;
    output.verbose_ctx("status", &format!("Opened project at: {}", project.root().display()));

    let store = project.source_store();
    let loaded = store.load()?;
    let schema = loaded.as_ref().map(|l| l.document.schema_version);

    let record = project.generation_record()?;
    let drift = record
        .as_ref()
        .map(|r| r.status(project.root()))
        .unwrap_or_default();

    let source_changed = match (&record, store.exists()) {
        (Some(record), true) => record.source_changed(&fs::read(store.path())?),
        _ => false,
    };

    if output.is_json() {
        output.data(&serde_json::json!({
            "source": store.path(),
            "schemaVersion": schema,
            "latestSchemaVersion": SchemaVersion::LATEST,
            "generatedAt": record.as_ref().map(|r| r.generated_at),
            "sourceChanged": source_changed,
            "adapters": drift,
        }));
        return Ok(());
    }

    match schema {
        Some(version) if version < SchemaVersion::LATEST => println!(
            "Canonical document: schema {} (run 'promptsync migrate' to upgrade to {})",
            version,
            SchemaVersion::LATEST
        ),
        Some(version) => println!("Canonical document: schema {}", version),
        None => println!("Canonical document: missing ({})", project.relative_path(store.path()).display()),
    }

    let Some(record) = record else {
        println!("No generation recorded. Run 'promptsync generate'.");
        return Ok(());
    };

    println!("Last generated: {}", record.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if source_changed {
        println!("Canonical document changed since the last generation");
    }

    for adapter in &drift {
        if adapter.is_clean() {
            println!("  {:<16} clean ({} file(s))", adapter.adapter, adapter.unchanged.len());
            continue;
        }
        println!("  {:<16} drifted", adapter.adapter);
        for path in &adapter.modified {
            println!("    modified: {}", path.display());
        }
        for path in &adapter.missing {
            println!("    missing:  {}", path.display());
        }
    }

    Ok(())
}

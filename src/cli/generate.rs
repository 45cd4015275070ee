//! Generate command

use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use super::app::{engine_for, select_adapters, Operation};
use super::output::Output;
use crate::domain::{VariableLayers, VariableTable};
use crate::storage::{checksum, GenerationRecord, Project, Pruned};

/// Writes native files for the selected adapters
pub fn run(output: &Output, requested: &[String], vars: &[String], target: Option<PathBuf>) -> Result<()> {
    let project = Project::open_current()?;
    output.verbose_ctx("generate", &format!("Opened project at: {}", project.root().display()));

    let engine = engine_for(&project)?;
    let config = &project.config().project;

    let store = project.source_store();
    let loaded = store.require()?;

    let overrides = VariableTable::from_assignments(vars).map_err(|e| anyhow!(e))?;
    let local = project.local_variables().load()?;
    output.verbose_ctx(
        "generate",
        &format!("{} local variable(s), {} override(s)", local.len(), overrides.len()),
    );
    let layers = VariableLayers::new(local, overrides);

    let adapters = select_adapters(&engine, requested, &config.adapters, Operation::Generate)?;
    let target = target.unwrap_or_else(|| project.root().to_path_buf());
    output.verbose_ctx(
        "generate",
        &format!("Adapters: {} -> {}", adapters.join(", "), target.display()),
    );

    let report = engine.generate_all(&loaded.document, &adapters, &target, &layers);

    let mut warnings: Vec<String> = loaded.notes.iter().map(|n| n.to_string()).collect();
    for generated in &report.succeeded {
        if !generated.unresolved.is_empty() {
            warnings.push(format!(
                "{}: unresolved placeholder(s): {}",
                generated.adapter,
                generated.unresolved.join(", ")
            ));
        }
    }

    let mut pruned: Vec<(String, Pruned)> = Vec::new();
    if config.record_generation && !report.succeeded.is_empty() {
        let source = fs::read(store.path())
            .with_context(|| format!("Failed to read canonical document: {}", store.path().display()))?;
        let previous = match project.generation_record() {
            Ok(previous) => previous,
            Err(e) => {
                output.warning(&format!("Ignoring unreadable generation record: {:#}", e));
                None
            }
        };

        let mut record = GenerationRecord::begin(previous, &loaded.document, Some(checksum(&source)), engine.now());
        for generated in &report.succeeded {
            let stale = record.prune(generated, project.root())?;
            for kept in &stale.kept {
                warnings.push(format!(
                    "{}: {} is no longer generated but was edited; not removed",
                    generated.adapter,
                    kept.display()
                ));
            }
            if !stale.is_empty() {
                pruned.push((generated.adapter.clone(), stale));
            }
            record.record(generated, project.root())?;
        }
        record.save(project.root())?;
        output.verbose_ctx("generate", "Updated generation record");
    }

    if output.is_json() {
        let generated: Vec<_> = report
            .succeeded
            .iter()
            .map(|g| {
                serde_json::json!({
                    "adapter": g.adapter,
                    "files": g.files,
                })
            })
            .collect();
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|(adapter, e)| serde_json::json!({ "adapter": adapter, "error": e.to_string() }))
            .collect();
        let removed: Vec<_> = pruned
            .iter()
            .flat_map(|(_, p)| p.removed.iter())
            .collect();

        output.data(&serde_json::json!({
            "success": report.is_success(),
            "generated": generated,
            "removed": removed,
            "failed": failed,
            "warnings": warnings,
        }));
    } else {
        for warning in &warnings {
            output.warning(warning);
        }
        for generated in &report.succeeded {
            println!("Generated {} ({} file(s))", generated.adapter, generated.files.len());
            for file in &generated.files {
                println!("  {}", project.relative_path(file).display());
            }
        }
        for (adapter, stale) in &pruned {
            for file in &stale.removed {
                println!("Removed stale {} file {}", adapter, file.display());
            }
        }
        for (adapter, e) in &report.failed {
            eprintln!("Failed {}: {}", adapter, e);
        }
    }

    if !report.is_success() {
        bail!("{} of {} adapter(s) failed", report.failed.len(), adapters.len());
    }

    Ok(())
}

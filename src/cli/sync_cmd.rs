//! Sync command

use std::path::PathBuf;

use anyhow::{bail, Result};

use super::app::{engine_for, select_adapters, Operation};
use super::output::Output;
use crate::storage::Project;

/// Merges native files for the selected adapters into the canonical document
pub fn run(output: &Output, requested: &[String], source: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let project = Project::open_current()?;
    output.verbose_ctx("sync", &format!("Opened project at: {}", project.root().display()));

    let local = project.local_variables().load()?;
    output.verbose_ctx("sync", &format!("Restoring {} local variable(s)", local.len()));
    let engine = engine_for(&project)?.with_local_variables(local);
    let store = project.source_store();

    let existing = store.load()?;
    let mut warnings: Vec<String> = Vec::new();
    if let Some(loaded) = &existing {
        warnings.extend(loaded.notes.iter().map(|n| n.to_string()));
    } else {
        output.verbose_ctx("sync", "No canonical document yet; starting from native files");
    }

    let mut adapters = select_adapters(&engine, requested, &project.config().project.adapters, Operation::Parse)?;
    let source_dir = source.unwrap_or_else(|| project.root().to_path_buf());

    // Adapters whose files still match the last generation carry no edits
    if requested.is_empty() && source_dir == project.root() {
        if let Some(record) = project.generation_record()? {
            let clean: Vec<String> = record
                .status(project.root())
                .into_iter()
                .filter(|drift| drift.is_clean())
                .map(|drift| drift.adapter)
                .collect();
            adapters.retain(|name| {
                let skip = clean.contains(name);
                if skip {
                    output.verbose_ctx("sync", &format!("Skipping {}: unchanged since last generation", name));
                }
                !skip
            });
        }
    }
    output.verbose_ctx(
        "sync",
        &format!("Adapters: {} <- {}", adapters.join(", "), source_dir.display()),
    );

    let report = engine.sync_all(&adapters, &source_dir, existing.as_ref().map(|l| &l.document));

    for synced in &report.batch.succeeded {
        if !synced.found {
            output.verbose_ctx(&synced.adapter, "no native files found");
            continue;
        }
        warnings.extend(synced.warnings.iter().map(|w| format!("{}: {}", synced.adapter, w)));
        warnings.extend(synced.notes.iter().map(|n| format!("{}: {}", synced.adapter, n)));
    }

    let changed = report.changed();
    let written = match &report.document {
        Some(document) if changed && !dry_run => {
            store.save(document)?;
            true
        }
        _ => false,
    };

    if output.is_json() {
        let adapters_json: Vec<_> = report
            .batch
            .succeeded
            .iter()
            .map(|s| {
                serde_json::json!({
                    "adapter": s.adapter,
                    "found": s.found,
                    "changed": s.changed,
                    "warnings": s.warnings,
                })
            })
            .collect();
        let failed: Vec<_> = report
            .batch
            .failed
            .iter()
            .map(|(adapter, e)| serde_json::json!({ "adapter": adapter, "error": e.to_string() }))
            .collect();

        output.data(&serde_json::json!({
            "success": report.batch.is_success(),
            "changed": changed,
            "written": written,
            "dryRun": dry_run,
            "adapters": adapters_json,
            "failed": failed,
            "warnings": warnings,
        }));
    } else {
        for warning in &warnings {
            output.warning(warning);
        }
        for synced in &report.batch.succeeded {
            let state = match (synced.found, synced.changed) {
                (false, _) => "not found",
                (true, true) => "changed",
                (true, false) => "unchanged",
            };
            println!("Synced {} ({})", synced.adapter, state);
        }
        for (adapter, e) in &report.batch.failed {
            eprintln!("Failed {}: {}", adapter, e);
        }

        if written {
            println!("Updated {}", project.relative_path(store.path()).display());
        } else if changed && dry_run {
            println!("Dry run: {} not written", project.relative_path(store.path()).display());
            if let Some(document) = &report.document {
                print!("{}", document.to_yaml()?);
            }
        } else {
            println!("Canonical document is up to date");
        }
    }

    if !report.batch.is_success() {
        bail!("{} of {} adapter(s) failed", report.batch.failed.len(), adapters.len());
    }

    Ok(())
}

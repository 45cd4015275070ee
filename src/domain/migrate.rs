//! Version migrator
//!
//! Migration is a chain of single-step transforms
//! (1.0 → 2.0 → 2.1 → 3.0 → 3.1). Each step is pure; steps that lose
//! information report what they dropped as [`DocumentNote`]s so callers can
//! surface it. Downgrades are not supported.

use thiserror::Error;

use super::document::{CanonicalDocument, DocumentNote, LegacyBody, SchemaVersion};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("Cannot migrate schema {from} down to {to}; downgrades are not supported")]
    IllegalDowngrade {
        from: SchemaVersion,
        to: SchemaVersion,
    },
}

/// A migrated document plus everything the migration dropped
#[derive(Debug, Clone)]
pub struct Migrated {
    pub document: CanonicalDocument,
    pub notes: Vec<DocumentNote>,
}

/// Migrates `doc` to `target`, one step at a time
pub fn migrate(doc: CanonicalDocument, target: SchemaVersion) -> Result<Migrated, MigrationError> {
    if target < doc.schema_version {
        return Err(MigrationError::IllegalDowngrade {
            from: doc.schema_version,
            to: target,
        });
    }

    Ok(upgrade(doc, target))
}

/// Migrates to the latest schema version; never fails
pub fn migrate_to_latest(doc: CanonicalDocument) -> Migrated {
    upgrade(doc, SchemaVersion::LATEST)
}

/// Steps upward until `target` is reached; a no-op when already there
pub(crate) fn upgrade(doc: CanonicalDocument, target: SchemaVersion) -> Migrated {
    let mut document = doc;
    let mut notes = Vec::new();

    while document.schema_version < target {
        let from = document.schema_version;
        let (next, step_notes) = step(document);
        tracing::debug!(from = %from, to = %next.schema_version, "migrated schema");
        for note in &step_notes {
            tracing::warn!(field = %note.field, from = %from, "{}", note.message);
        }
        notes.extend(step_notes);
        document = next;
    }

    Migrated { document, notes }
}

fn step(doc: CanonicalDocument) -> (CanonicalDocument, Vec<DocumentNote>) {
    match doc.schema_version {
        SchemaVersion::V1 => v1_to_v2_0(doc),
        SchemaVersion::V2_0 => (v2_0_to_v2_1(doc), Vec::new()),
        SchemaVersion::V2_1 => (v2_1_to_v3_0(doc), Vec::new()),
        SchemaVersion::V3_0 => (v3_0_to_v3_1(doc), Vec::new()),
        SchemaVersion::V3_1 => (doc, Vec::new()),
    }
}

/// Renders structured instructions into a single markdown body and drops the
/// per-editor `targets` list
pub fn v1_to_v2_0(mut doc: CanonicalDocument) -> (CanonicalDocument, Vec<DocumentNote>) {
    let mut notes = Vec::new();
    let body = doc.legacy.take().unwrap_or_default();

    if !body.targets.is_empty() {
        notes.push(DocumentNote::new(
            "targets",
            format!(
                "dropped [{}]; documents from schema 2.0 on are target-agnostic",
                body.targets.join(", ")
            ),
        ));
    }

    doc.content = render_legacy(&doc.metadata.title, &doc.metadata.description, &body);
    doc.schema_version = SchemaVersion::V2_0;
    (doc, notes)
}

/// Nothing moves; 2.1 merely allows a nested `plugins` block
pub fn v2_0_to_v2_1(mut doc: CanonicalDocument) -> CanonicalDocument {
    doc.schema_version = SchemaVersion::V2_1;
    doc
}

/// Promotes the nested plugin lists to top-level fields. The lists already live
/// in one [`PluginSet`](super::plugins::PluginSet) in memory, so only the
/// serialized layout changes.
pub fn v2_1_to_v3_0(mut doc: CanonicalDocument) -> CanonicalDocument {
    doc.schema_version = SchemaVersion::V3_0;
    doc
}

/// Additive: commands may now carry workflow fields
pub fn v3_0_to_v3_1(mut doc: CanonicalDocument) -> CanonicalDocument {
    doc.schema_version = SchemaVersion::V3_1;
    doc
}

fn push_bullets(out: &mut String, heading: &str, items: &[String]) {
    let items: Vec<_> = items.iter().filter(|i| !i.trim().is_empty()).collect();
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("## {}\n\n", heading));
    for item in items {
        out.push_str(&format!("- {}\n", item.trim()));
    }
    out.push('\n');
}

/// Fixed section order: general principles, code style, examples, context footer
fn render_legacy(title: &str, description: &str, body: &LegacyBody) -> String {
    let mut out = String::new();

    if !title.trim().is_empty() {
        out.push_str(&format!("# {}\n\n", title.trim()));
    }
    if !description.trim().is_empty() {
        out.push_str(&format!("{}\n\n", description.trim()));
    }

    push_bullets(&mut out, "General Principles", &body.instructions.general);
    push_bullets(&mut out, "Code Style", &body.instructions.code_style);

    if !body.examples.is_empty() {
        out.push_str("## Examples\n\n");
        for example in &body.examples {
            out.push_str(&format!("### {}\n\n", example.title.trim()));
            if let Some(description) = example.description.as_deref().filter(|d| !d.trim().is_empty()) {
                out.push_str(&format!("{}\n\n", description.trim()));
            }
            if !example.code.trim().is_empty() {
                let language = example.language.as_deref().unwrap_or("");
                out.push_str(&format!("```{}\n{}\n```\n\n", language, example.code.trim_end()));
            }
        }
    }

    let context = &body.context;
    let has_context = context.project_type.is_some()
        || !context.technologies.is_empty()
        || !context.conventions.is_empty();
    if has_context {
        out.push_str("## Project Context\n\n");
        if let Some(project_type) = context.project_type.as_deref() {
            out.push_str(&format!("Project type: {}\n", project_type.trim()));
        }
        if !context.technologies.is_empty() {
            out.push_str(&format!("Technologies: {}\n", context.technologies.join(", ")));
        }
        if !context.conventions.is_empty() {
            out.push_str("\nConventions:\n\n");
            for convention in &context.conventions {
                out.push_str(&format!("- {}\n", convention.trim()));
            }
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{LegacyContext, LegacyExample, LegacyInstructions, Metadata};
    use crate::domain::plugins::Command;

    fn legacy_doc() -> CanonicalDocument {
        let mut metadata = Metadata::new("Acme API");
        metadata.description = "Guidelines for the Acme API.".to_string();

        CanonicalDocument::legacy(
            metadata,
            LegacyBody {
                instructions: LegacyInstructions {
                    general: vec!["Prefer small functions".to_string()],
                    code_style: vec!["Use rustfmt".to_string()],
                },
                context: LegacyContext {
                    project_type: Some("web service".to_string()),
                    technologies: vec!["Rust".to_string(), "Postgres".to_string()],
                    conventions: vec![],
                },
                examples: vec![LegacyExample {
                    title: "Error handling".to_string(),
                    description: None,
                    language: Some("rust".to_string()),
                    code: "fn main() -> anyhow::Result<()> { Ok(()) }".to_string(),
                }],
                targets: vec!["cursor".to_string(), "claude".to_string()],
            },
        )
    }

    #[test]
    fn v1_renders_sections_in_fixed_order() {
        let migrated = migrate(legacy_doc(), SchemaVersion::V2_0).unwrap();
        let content = &migrated.document.content;

        let general = content.find("## General Principles").unwrap();
        let style = content.find("## Code Style").unwrap();
        let examples = content.find("## Examples").unwrap();
        let footer = content.find("## Project Context").unwrap();

        assert!(content.starts_with("# Acme API"));
        assert!(general < style && style < examples && examples < footer);
        assert!(content.contains("```rust\nfn main()"));
        assert!(content.contains("Technologies: Rust, Postgres"));
        assert!(migrated.document.legacy.is_none());
    }

    #[test]
    fn v1_migration_reports_dropped_targets() {
        let migrated = migrate(legacy_doc(), SchemaVersion::V2_0).unwrap();
        assert_eq!(migrated.notes.len(), 1);
        assert_eq!(migrated.notes[0].field, "targets");
        assert!(migrated.notes[0].message.contains("cursor, claude"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let doc = CanonicalDocument::legacy(Metadata::new("Tiny"), LegacyBody::default());
        let migrated = migrate(doc, SchemaVersion::V2_0).unwrap();
        assert_eq!(migrated.document.content, "# Tiny");
        assert!(migrated.notes.is_empty());
    }

    #[test]
    fn full_chain_reaches_latest() {
        let migrated = migrate_to_latest(legacy_doc());
        assert_eq!(migrated.document.schema_version, SchemaVersion::LATEST);
    }

    #[test]
    fn same_version_is_noop() {
        let doc = CanonicalDocument::new("Demo", "Body");
        let migrated = migrate(doc.clone(), SchemaVersion::V3_1).unwrap();
        assert_eq!(migrated.document, doc);
    }

    #[test]
    fn downgrade_is_rejected() {
        let migrated = migrate(legacy_doc(), SchemaVersion::V2_0).unwrap();
        let err = migrate(migrated.document, SchemaVersion::V1).unwrap_err();
        assert_eq!(
            err,
            MigrationError::IllegalDowngrade {
                from: SchemaVersion::V2_0,
                to: SchemaVersion::V1,
            }
        );
    }

    #[test]
    fn v2_1_to_v3_0_moves_plugins_to_top_level() {
        let mut doc = CanonicalDocument::new("Demo", "Body");
        doc.schema_version = SchemaVersion::V2_1;
        doc.plugins.commands.push(Command::new("test", "Run the tests"));
        let before = doc.to_raw();
        assert!(before.plugins.is_some() && before.commands.is_none());

        let migrated = migrate(doc, SchemaVersion::V3_0).unwrap();
        let after = migrated.document.to_raw();
        assert!(after.plugins.is_none());
        assert_eq!(after.commands.unwrap()[0].name, "test");
    }

    #[test]
    fn v3_1_commands_default_to_single_step() {
        let mut doc = CanonicalDocument::new("Demo", "Body");
        doc.schema_version = SchemaVersion::V3_0;
        doc.plugins.commands.push(Command::new("test", "Run the tests"));

        let migrated = migrate(doc, SchemaVersion::V3_1).unwrap();
        assert!(!migrated.document.plugins.commands[0].is_multi_step());
    }
}

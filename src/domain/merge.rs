//! Merge engine
//!
//! Reconciles a freshly decoded document with the canonical document that
//! existed before the sync. Native files are the source of truth for
//! instructional text; the user owns metadata, variable defaults and any
//! plugin the native format cannot show.
//!
//! | Part | Rule |
//! |------|------|
//! | metadata | existing wins; decoded only fills empty fields |
//! | content / documents | decoded wins, after variable restoration; blocks keep the existing order |
//! | variables | union, existing wins on collision |
//! | plugins | keyed by name: add new, replace shared, keep existing-only |
//! | schema version | max of both, never a downgrade |
//!
//! Restoration uses the existing document's variables plus, through
//! [`merge_restoring`], values from the local variable file, so values kept
//! out of the committed document never land in it.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::document::{CanonicalDocument, DocumentBlock, DocumentNote, Metadata, SchemaVersion};
use super::migrate::{migrate_to_latest, upgrade};
use super::plugins::{Named, PluginKind, PluginSet};
use super::variables::{Bindings, VariableOrigin, VariableTable};

/// How decoded instruction text is combined with the existing text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListMerge {
    /// Decoded text replaces existing text wholesale
    #[default]
    Replace,

    /// Decoded lines are appended unless an equal (trimmed) line exists.
    /// Fenced code blocks are compared and appended as a whole.
    Concatenate,
}

/// Non-fatal decisions the merge made on the caller's behalf
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum MergeWarning {
    /// The two documents declared different schema versions
    VersionMismatch {
        existing: SchemaVersion,
        decoded: SchemaVersion,
        merged: SchemaVersion,
    },

    /// A hand-authored metadata field was kept over a different decoded value
    MetadataConflict {
        field: String,
        kept: String,
        discarded: String,
    },

    /// Same-named plugin entries differ only in whitespace or list order
    PluginConflict { kind: PluginKind, name: String },
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeWarning::VersionMismatch {
                existing,
                decoded,
                merged,
            } => write!(
                f,
                "schema version mismatch: existing {}, decoded {}; merged as {}",
                existing, decoded, merged
            ),
            MergeWarning::MetadataConflict {
                field,
                kept,
                discarded,
            } => write!(
                f,
                "metadata.{} differs; kept '{}', ignored '{}'",
                field, kept, discarded
            ),
            MergeWarning::PluginConflict { kind, name } => write!(
                f,
                "{} entry '{}' differs only in formatting; kept the existing entry",
                kind, name
            ),
        }
    }
}

/// Result of a merge
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: CanonicalDocument,
    pub warnings: Vec<MergeWarning>,

    /// Fields dropped by migration or legality enforcement
    pub notes: Vec<DocumentNote>,
}

/// Merges `decoded` into `existing`
pub fn merge(
    existing: Option<&CanonicalDocument>,
    decoded: CanonicalDocument,
    policy: ListMerge,
) -> MergeOutcome {
    merge_restoring(existing, decoded, policy, &VariableTable::new())
}

/// [`merge`], also restoring values that came from the local variable file
pub fn merge_restoring(
    existing: Option<&CanonicalDocument>,
    decoded: CanonicalDocument,
    policy: ListMerge,
    local: &VariableTable,
) -> MergeOutcome {
    let Some(existing) = existing else {
        let migrated = migrate_to_latest(decoded);
        let mut document = migrated.document;
        let mut notes = migrated.notes;
        notes.extend(document.enforce_legality());
        return MergeOutcome {
            document,
            warnings: Vec::new(),
            notes,
        };
    };

    let mut warnings = Vec::new();
    let mut notes = Vec::new();

    let target = existing.schema_version.max(decoded.schema_version);
    if existing.schema_version != decoded.schema_version {
        warnings.push(MergeWarning::VersionMismatch {
            existing: existing.schema_version,
            decoded: decoded.schema_version,
            merged: target,
        });
    }

    let base = upgrade(existing.clone(), target);
    notes.extend(base.notes);
    let base = base.document;

    let incoming = upgrade(decoded, target);
    notes.extend(incoming.notes);
    let incoming = incoming.document;

    let mut restoration = Bindings::from_table(&base.variables, VariableOrigin::Document);
    restoration.bind_table(local, VariableOrigin::LocalFile);

    let incoming_metadata = restore_metadata(&incoming.metadata, &restoration);
    let metadata = merge_metadata(&base.metadata, &incoming_metadata, &mut warnings);
    let content = merge_text(&base.content, &restoration.restore(&incoming.content), policy);
    let documents = merge_documents(&base.documents, &incoming.documents, &restoration, policy);
    let variables = merge_variables(&base.variables, &incoming.variables);
    let incoming_plugins = restore_plugins(&incoming.plugins, &restoration);
    let plugins = merge_plugins(&base.plugins, &incoming_plugins, &mut warnings);

    let mut document = CanonicalDocument {
        schema_version: target,
        metadata,
        legacy: base.legacy,
        content,
        variables,
        documents,
        plugins,
    };
    notes.extend(document.enforce_legality());

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    MergeOutcome {
        document,
        warnings,
        notes,
    }
}

/// Decoded title and description may carry substituted literals too
fn restore_metadata(decoded: &Metadata, restoration: &Bindings) -> Metadata {
    Metadata {
        title: restoration.restore(&decoded.title),
        description: restoration.restore(&decoded.description),
        ..decoded.clone()
    }
}

fn merge_string_field(
    field: &str,
    existing: &str,
    decoded: &str,
    warnings: &mut Vec<MergeWarning>,
) -> String {
    let existing_blank = existing.trim().is_empty();
    let decoded_blank = decoded.trim().is_empty();

    if existing_blank && !decoded_blank {
        return decoded.to_string();
    }
    if !existing_blank && !decoded_blank && existing.trim() != decoded.trim() {
        warnings.push(MergeWarning::MetadataConflict {
            field: field.to_string(),
            kept: existing.to_string(),
            discarded: decoded.to_string(),
        });
    }
    existing.to_string()
}

fn merge_metadata(existing: &Metadata, decoded: &Metadata, warnings: &mut Vec<MergeWarning>) -> Metadata {
    let mut merged = existing.clone();

    merged.title = merge_string_field("title", &existing.title, &decoded.title, warnings);
    merged.description =
        merge_string_field("description", &existing.description, &decoded.description, warnings);

    let author = merge_string_field(
        "author",
        existing.author.as_deref().unwrap_or(""),
        decoded.author.as_deref().unwrap_or(""),
        warnings,
    );
    merged.author = if author.trim().is_empty() {
        existing.author.clone()
    } else {
        Some(author)
    };

    if existing.tags.is_empty() {
        merged.tags = decoded.tags.clone();
    } else if !decoded.tags.is_empty() {
        let ours: HashSet<_> = existing.tags.iter().collect();
        let theirs: HashSet<_> = decoded.tags.iter().collect();
        if ours != theirs {
            warnings.push(MergeWarning::MetadataConflict {
                field: "tags".to_string(),
                kept: existing.tags.join(", "),
                discarded: decoded.tags.join(", "),
            });
        }
    }

    if merged.created.is_none() {
        merged.created = decoded.created;
    }

    merged
}

/// A line, or a whole fenced code block, compared as one unit
#[derive(Debug)]
struct TextUnit {
    text: String,

    /// Trimmed lines, used for duplicate detection
    key: String,

    /// A blank line separated this unit from the one before
    blank_before: bool,
}

fn is_fence(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("```") || line.starts_with("~~~")
}

fn text_units(text: &str) -> Vec<TextUnit> {
    let mut units = Vec::new();
    let mut lines = text.lines();
    let mut blank_before = false;

    while let Some(line) = lines.next() {
        if line.trim().is_empty() {
            blank_before = true;
            continue;
        }

        let mut block = vec![line.trim_end()];
        if is_fence(line) {
            // an unterminated fence runs to the end of the text
            for inner in lines.by_ref() {
                block.push(inner.trim_end());
                if is_fence(inner) {
                    break;
                }
            }
        }

        units.push(TextUnit {
            text: block.join("\n"),
            key: block.iter().map(|l| l.trim()).collect::<Vec<_>>().join("\n"),
            blank_before: blank_before && !units.is_empty(),
        });
        blank_before = false;
    }

    units
}

/// Appends lines and fenced blocks of `incoming` that do not already appear
/// in `existing`
pub fn concatenate_dedup(existing: &str, incoming: &str) -> String {
    let mut seen: HashSet<String> = text_units(existing).into_iter().map(|u| u.key).collect();

    let additions: Vec<TextUnit> = text_units(incoming)
        .into_iter()
        .filter(|unit| seen.insert(unit.key.clone()))
        .collect();

    if additions.is_empty() {
        return existing.to_string();
    }

    let mut out = existing.trim_end().to_string();
    for unit in additions {
        if !out.is_empty() {
            out.push_str(if unit.blank_before || is_fence(&unit.text) { "\n\n" } else { "\n" });
        }
        out.push_str(&unit.text);
    }
    out
}

fn merge_text(existing: &str, restored: &str, policy: ListMerge) -> String {
    match policy {
        ListMerge::Replace => restored.to_string(),
        ListMerge::Concatenate => concatenate_dedup(existing, restored),
    }
}

fn merge_documents(
    existing: &[DocumentBlock],
    decoded: &[DocumentBlock],
    restoration: &Bindings,
    policy: ListMerge,
) -> Vec<DocumentBlock> {
    let restored: Vec<DocumentBlock> = decoded
        .iter()
        .map(|block| DocumentBlock {
            content: restoration.restore(&block.content),
            description: block.description.as_deref().map(|d| restoration.restore(d)),
            ..block.clone()
        })
        .collect();

    match policy {
        ListMerge::Replace => in_existing_order(existing, restored),
        ListMerge::Concatenate => {
            let mut merged: Vec<DocumentBlock> = existing.to_vec();
            for block in restored {
                match merged.iter_mut().find(|b| b.name == block.name) {
                    Some(current) => {
                        current.content = concatenate_dedup(&current.content, &block.content);
                    }
                    None => merged.push(block),
                }
            }
            merged
        }
    }
}

/// Blocks also present in `existing` take its order; new blocks follow in
/// decoded order
fn in_existing_order(existing: &[DocumentBlock], mut decoded: Vec<DocumentBlock>) -> Vec<DocumentBlock> {
    decoded.sort_by_key(|block| {
        existing
            .iter()
            .position(|b| b.name == block.name)
            .unwrap_or(existing.len())
    });
    decoded
}

fn merge_variables(existing: &VariableTable, decoded: &VariableTable) -> VariableTable {
    let mut merged = existing.clone();
    for (name, value) in decoded.iter() {
        if !merged.contains(name) {
            merged.insert(name, value);
        }
    }
    merged
}

/// Restores placeholders in the free-text fields of decoded plugin entries
fn restore_plugins(decoded: &PluginSet, restoration: &Bindings) -> PluginSet {
    let restore_opt = |text: &Option<String>| text.as_deref().map(|t| restoration.restore(t));

    let mut set = decoded.clone();
    for server in &mut set.mcp_servers {
        server.command = restoration.restore(&server.command);
        server.args = server.args.iter().map(|a| restoration.restore(a)).collect();
        for value in server.env.values_mut() {
            *value = restoration.restore(value);
        }
        server.description = restore_opt(&server.description);
    }
    for command in &mut set.commands {
        command.content = restoration.restore(&command.content);
        command.description = restore_opt(&command.description);
        command.argument_hint = restore_opt(&command.argument_hint);
    }
    for agent in &mut set.agents {
        agent.content = restoration.restore(&agent.content);
        agent.description = restore_opt(&agent.description);
    }
    for hook in &mut set.hooks {
        hook.command = restoration.restore(&hook.command);
    }
    set
}

fn merge_plugins(existing: &PluginSet, decoded: &PluginSet, warnings: &mut Vec<MergeWarning>) -> PluginSet {
    PluginSet {
        mcp_servers: merge_by_name(&existing.mcp_servers, &decoded.mcp_servers, PluginKind::McpServers, warnings),
        commands: merge_by_name(&existing.commands, &decoded.commands, PluginKind::Commands, warnings),
        agents: merge_by_name(&existing.agents, &decoded.agents, PluginKind::Agents, warnings),
        hooks: merge_by_name(&existing.hooks, &decoded.hooks, PluginKind::Hooks, warnings),
    }
}

/// Name-keyed merge: existing order is kept, decoded-only entries are appended
fn merge_by_name<T>(existing: &[T], decoded: &[T], kind: PluginKind, warnings: &mut Vec<MergeWarning>) -> Vec<T>
where
    T: Named + Clone + PartialEq + Serialize,
{
    let mut merged: Vec<T> = existing.to_vec();

    for entry in decoded {
        match merged.iter_mut().find(|e| e.name() == entry.name()) {
            Some(current) => {
                let mut replacement = entry.clone();
                replacement.keep_unrepresented(current);
                if *current == replacement {
                    continue;
                }
                if cosmetically_equal(current, &replacement) {
                    warnings.push(MergeWarning::PluginConflict {
                        kind,
                        name: entry.name().to_string(),
                    });
                } else {
                    *current = replacement;
                }
            }
            None => merged.push(entry.clone()),
        }
    }

    merged
}

/// True when two entries only differ in whitespace or the order of string lists
fn cosmetically_equal<T: Serialize>(a: &T, b: &T) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => normalize_value(a) == normalize_value(b),
        _ => false,
    }
}

fn normalize_value(value: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::String(s) => Value::String(s.split_whitespace().collect::<Vec<_>>().join(" ")),
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(normalize_value).collect();
            if items.iter().all(Value::is_string) {
                items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
            }
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_value(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::plugins::{Agent, Command};

    fn existing_doc() -> CanonicalDocument {
        let mut doc = CanonicalDocument::new("Acme", "Hello {{NAME}}");
        doc.metadata.description = "Acme rules".to_string();
        doc.variables.insert("NAME", "Foo");
        doc
    }

    #[test]
    fn absent_existing_migrates_decoded() {
        let mut decoded = CanonicalDocument::new("Fresh", "Body");
        decoded.schema_version = SchemaVersion::V2_0;

        let outcome = merge(None, decoded, ListMerge::Replace);

        assert_eq!(outcome.document.schema_version, SchemaVersion::LATEST);
        assert_eq!(outcome.document.content, "Body");
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn content_is_restored_with_existing_variables() {
        let existing = existing_doc();
        let decoded = CanonicalDocument::new("", "Hello Foo, welcome");

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);

        assert_eq!(outcome.document.content, "Hello {{NAME}}, welcome");
        assert_eq!(outcome.document.variables, existing.variables);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn metadata_is_not_overwritten() {
        let existing = existing_doc();
        let mut decoded = CanonicalDocument::new("Machine Title", "Hello Foo");
        decoded.metadata.author = Some("bot".to_string());

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);

        assert_eq!(outcome.document.metadata.title, "Acme");
        assert_eq!(outcome.document.metadata.author, Some("bot".to_string()));
        assert_eq!(
            outcome.warnings,
            vec![MergeWarning::MetadataConflict {
                field: "title".to_string(),
                kept: "Acme".to_string(),
                discarded: "Machine Title".to_string(),
            }]
        );
    }

    #[test]
    fn empty_metadata_is_filled() {
        let existing = CanonicalDocument::new("", "Body");
        let mut decoded = CanonicalDocument::new("Derived", "Body");
        decoded.metadata.tags = vec!["rust".to_string()];

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);

        assert_eq!(outcome.document.metadata.title, "Derived");
        assert_eq!(outcome.document.metadata.tags, vec!["rust"]);
    }

    #[test]
    fn plugins_only_in_existing_are_preserved() {
        let mut existing = existing_doc();
        existing.plugins.commands.push(Command::new("a", "Do A"));
        existing.plugins.commands.push(Command::new("b", "Do B"));

        let mut decoded = CanonicalDocument::new("", "Hello Foo");
        decoded.plugins.commands.push(Command::new("b", "Do B better"));

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);
        let commands = &outcome.document.plugins.commands;

        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], Command::new("a", "Do A"));
        assert_eq!(commands[1], Command::new("b", "Do B better"));
    }

    #[test]
    fn new_plugins_are_appended() {
        let existing = existing_doc();
        let mut decoded = CanonicalDocument::new("", "Hello Foo");
        decoded.plugins.agents.push(Agent::new("reviewer", "Review"));

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);
        assert_eq!(outcome.document.plugins.agents.len(), 1);
    }

    #[test]
    fn cosmetic_plugin_differences_keep_existing_and_warn() {
        let mut existing = existing_doc();
        let mut agent = Agent::new("reviewer", "Review the diff");
        agent.tools = vec!["Read".to_string(), "Grep".to_string()];
        existing.plugins.agents.push(agent.clone());

        let mut decoded = CanonicalDocument::new("", "Hello Foo");
        let mut edited = Agent::new("reviewer", "Review   the diff\n");
        edited.tools = vec!["Grep".to_string(), "Read".to_string()];
        decoded.plugins.agents.push(edited);

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);

        assert_eq!(outcome.document.plugins.agents[0], agent);
        assert_eq!(
            outcome.warnings,
            vec![MergeWarning::PluginConflict {
                kind: PluginKind::Agents,
                name: "reviewer".to_string(),
            }]
        );
    }

    #[test]
    fn version_mismatch_upgrades_and_warns() {
        let mut existing = existing_doc();
        existing.schema_version = SchemaVersion::V2_0;
        let decoded = CanonicalDocument::new("", "Hello Foo");

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);

        assert_eq!(outcome.document.schema_version, SchemaVersion::V3_1);
        assert!(matches!(
            outcome.warnings[0],
            MergeWarning::VersionMismatch {
                existing: SchemaVersion::V2_0,
                merged: SchemaVersion::V3_1,
                ..
            }
        ));
    }

    #[test]
    fn never_downgrades() {
        let existing = existing_doc();
        let mut decoded = CanonicalDocument::new("", "Hello Foo");
        decoded.schema_version = SchemaVersion::V2_0;

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);
        assert_eq!(outcome.document.schema_version, SchemaVersion::V3_1);
    }

    #[test]
    fn variables_union_existing_wins() {
        let existing = existing_doc();
        let mut decoded = CanonicalDocument::new("", "Hello Foo");
        decoded.variables.insert("NAME", "Bar");
        decoded.variables.insert("TEAM", "core");

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);

        assert_eq!(outcome.document.variables.get("NAME"), Some("Foo"));
        assert_eq!(outcome.document.variables.get("TEAM"), Some("core"));
    }

    #[test]
    fn concatenate_does_not_duplicate() {
        let mut existing = existing_doc();
        existing.content = "- Use {{NAME}}\n- Write tests".to_string();
        let decoded = CanonicalDocument::new("", "- Use Foo\n- Write tests\n- Document APIs");

        let once = merge(Some(&existing), decoded.clone(), ListMerge::Concatenate);
        assert_eq!(once.document.content, "- Use {{NAME}}\n- Write tests\n- Document APIs");

        let twice = merge(Some(&once.document), decoded, ListMerge::Concatenate);
        assert_eq!(twice.document.content, once.document.content);
    }

    #[test]
    fn concatenate_keeps_fenced_blocks_whole() {
        let existing = "## Style\n\n```rust\nlet a = 1;\n```";
        let incoming = "## Style\n\n```rust\nlet a = 1;\n```\n\n## Errors\n\n```rust\nlet b = 2;\n```";

        let merged = concatenate_dedup(existing, incoming);

        assert_eq!(
            merged,
            "## Style\n\n```rust\nlet a = 1;\n```\n\n## Errors\n\n```rust\nlet b = 2;\n```"
        );
        assert_eq!(merged.matches("```").count(), 4);
        assert_eq!(concatenate_dedup(&merged, incoming), merged);
    }

    #[test]
    fn concatenate_appends_unterminated_fence() {
        assert_eq!(concatenate_dedup("- a", "- a\n```\ncode"), "- a\n\n```\ncode");
    }

    #[test]
    fn local_values_are_restored() {
        let mut existing = existing_doc();
        existing.content = "Use token {{API_TOKEN}} for staging".to_string();
        let local: VariableTable = [("API_TOKEN", "s3cr3t-XYZ")].into_iter().collect();
        let decoded = CanonicalDocument::new("", "Use token s3cr3t-XYZ for staging and prod");

        let outcome = merge_restoring(Some(&existing), decoded, ListMerge::Replace, &local);

        assert_eq!(outcome.document.content, "Use token {{API_TOKEN}} for staging and prod");
        assert!(!outcome.document.variables.contains("API_TOKEN"));
    }

    #[test]
    fn unrepresented_command_fields_are_kept() {
        let mut existing = existing_doc();
        let mut command = Command::new("release", "Cut a release");
        command.argument_hint = Some("<version>".to_string());
        command.multi_step = Some(true);
        existing.plugins.commands.push(command);

        let mut decoded = CanonicalDocument::new("", "Hello Foo");
        decoded.plugins.commands.push(Command::new("release", "Cut a release carefully"));

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);
        let merged = &outcome.document.plugins.commands[0];

        assert_eq!(merged.content, "Cut a release carefully");
        assert_eq!(merged.argument_hint.as_deref(), Some("<version>"));
        assert_eq!(merged.multi_step, Some(true));
    }

    #[test]
    fn replaced_documents_keep_existing_order() {
        let mut existing = existing_doc();
        existing.documents.push(DocumentBlock::new("zeta", "Z"));
        existing.documents.push(DocumentBlock::new("alpha", "A"));
        let mut decoded = CanonicalDocument::new("", "Hello Foo");
        decoded.documents.push(DocumentBlock::new("alpha", "A2"));
        decoded.documents.push(DocumentBlock::new("new", "N"));
        decoded.documents.push(DocumentBlock::new("zeta", "Z"));

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);
        let names: Vec<_> = outcome.document.documents.iter().map(|b| b.name.as_str()).collect();

        assert_eq!(names, vec!["zeta", "alpha", "new"]);
    }

    #[test]
    fn concatenate_dedup_trims() {
        assert_eq!(concatenate_dedup("- a\n- b", "  - a  \n- c\n- c"), "- a\n- b\n- c");
        assert_eq!(concatenate_dedup("", "- a"), "- a");
        assert_eq!(concatenate_dedup("- a\n", "- a"), "- a\n");
    }

    #[test]
    fn documents_are_replaced_and_restored() {
        let mut existing = existing_doc();
        existing.documents.push(DocumentBlock::new("old", "gone"));
        let mut decoded = CanonicalDocument::new("", "Hello Foo");
        decoded.documents.push(DocumentBlock::new("team", "Ask Foo"));

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);

        assert_eq!(outcome.document.documents, vec![DocumentBlock::new("team", "Ask {{NAME}}")]);
    }

    #[test]
    fn merge_with_own_projection_is_identity() {
        let mut existing = existing_doc();
        existing.plugins.commands.push(Command::new("test", "Run tests for {{NAME}}"));
        let mut decoded = CanonicalDocument::new("Acme", "Hello Foo");
        decoded.plugins.commands.push(Command::new("test", "Run tests for {{NAME}}"));

        let outcome = merge(Some(&existing), decoded, ListMerge::Replace);
        assert_eq!(outcome.document, existing);
    }
}

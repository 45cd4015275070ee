//! Canonical document model
//!
//! The canonical document ("universal prompt") is the format-agnostic source of
//! truth for a project's assistant configuration. Its serialized layout depends
//! on the schema version:
//!
//! | Field | 1.0 | 2.0 | 2.1 | 3.0 | 3.1 |
//! |-------|-----|-----|-----|-----|-----|
//! | `metadata`, `variables` | ✓ | ✓ | ✓ | ✓ | ✓ |
//! | `instructions`, `context`, `examples`, `targets` | ✓ | | | | |
//! | `content`, `documents` | | ✓ | ✓ | ✓ | ✓ |
//! | nested `plugins` | | | ✓ | | |
//! | top-level `mcpServers`, `commands`, `agents`, `hooks` | | | | ✓ | ✓ |
//! | command workflow fields | | | | | ✓ |
//!
//! In memory the plugin lists always live in one [`PluginSet`]; the version
//! decides where they are written. Loading goes through [`RawDocument`] so that
//! fields illegal for the declared version are dropped and reported instead of
//! silently kept.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::plugins::{Agent, Command, Hook, McpServer, PluginSet};
use super::variables::VariableTable;

/// Schema version of a canonical document, ordered oldest to newest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaVersion {
    V1,
    V2_0,
    V2_1,
    V3_0,
    V3_1,
}

impl SchemaVersion {
    pub const LATEST: SchemaVersion = SchemaVersion::V3_1;

    /// Returns all versions, oldest first
    pub fn all() -> &'static [SchemaVersion] {
        &[
            SchemaVersion::V1,
            SchemaVersion::V2_0,
            SchemaVersion::V2_1,
            SchemaVersion::V3_0,
            SchemaVersion::V3_1,
        ]
    }

    /// The version one migration step above this one
    pub fn next(&self) -> Option<SchemaVersion> {
        match self {
            SchemaVersion::V1 => Some(SchemaVersion::V2_0),
            SchemaVersion::V2_0 => Some(SchemaVersion::V2_1),
            SchemaVersion::V2_1 => Some(SchemaVersion::V3_0),
            SchemaVersion::V3_0 => Some(SchemaVersion::V3_1),
            SchemaVersion::V3_1 => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1 => "1.0",
            SchemaVersion::V2_0 => "2.0",
            SchemaVersion::V2_1 => "2.1",
            SchemaVersion::V3_0 => "3.0",
            SchemaVersion::V3_1 => "3.1",
        }
    }

    /// Structured `instructions`/`context`/`examples` instead of `content`
    pub fn is_legacy(&self) -> bool {
        *self == SchemaVersion::V1
    }

    /// Plugins are allowed at all
    pub fn supports_plugins(&self) -> bool {
        *self >= SchemaVersion::V2_1
    }

    /// Plugins are written under a nested `plugins` key
    pub fn nests_plugins(&self) -> bool {
        *self == SchemaVersion::V2_1
    }

    /// Commands may carry workflow fields
    pub fn supports_workflows(&self) -> bool {
        *self >= SchemaVersion::V3_1
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(['v', 'V']) {
            "1" | "1.0" => Ok(SchemaVersion::V1),
            "2" | "2.0" => Ok(SchemaVersion::V2_0),
            "2.1" => Ok(SchemaVersion::V2_1),
            "3" | "3.0" => Ok(SchemaVersion::V3_0),
            "3.1" => Ok(SchemaVersion::V3_1),
            _ => Err(format!("Unknown schema version: {}", s)),
        }
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VersionVisitor;

        impl Visitor<'_> for VersionVisitor {
            type Value = SchemaVersion;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a schema version such as \"3.1\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }

            // Unquoted YAML versions arrive as numbers
            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                self.visit_str(&v.to_string())
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                self.visit_str(&v.to_string())
            }
        }

        deserializer.deserialize_any(VersionVisitor)
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Descriptive metadata, legal in every schema version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Semantic version of the prompt itself (not the schema)
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    /// Ordered tag set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            version: default_version(),
            author: None,
            created: None,
            updated: None,
            tags: Vec::new(),
        }
    }
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Removes blank and repeated tags, keeping first occurrences
    pub fn normalize_tags(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.tags.retain(|tag| !tag.trim().is_empty() && seen.insert(tag.trim().to_string()));
    }
}

/// Schema 1.0 structured instructions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyInstructions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub general: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_style: Vec<String>,
}

/// Schema 1.0 project context, rendered as the footer on migration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conventions: Vec<String>,
}

/// Schema 1.0 worked example
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyExample {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default)]
    pub code: String,
}

/// Everything a schema 1.0 document carries instead of `content`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyBody {
    pub instructions: LegacyInstructions,
    pub context: LegacyContext,
    pub examples: Vec<LegacyExample>,

    /// Editors the document was meant for (dropped on migration)
    pub targets: Vec<String>,
}

/// A secondary block of instructions, usually scoped to a technology or path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBlock {
    pub name: String,

    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_globs: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DocumentBlock {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            file_globs: Vec::new(),
            description: None,
        }
    }
}

/// A field that was dropped or rewritten while loading or migrating
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentNote {
    /// Dotted path of the affected field (e.g. `plugins.commands`)
    pub field: String,
    pub message: String,
}

impl DocumentNote {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DocumentNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// On-disk layout of a canonical document, covering every version's fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<SchemaVersion>,

    pub metadata: Metadata,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<LegacyInstructions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<LegacyContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<LegacyExample>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<VariableTable>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<DocumentBlock>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugins: Option<PluginSet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<Vec<McpServer>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<Command>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<Agent>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Vec<Hook>>,
}

impl RawDocument {
    fn has_legacy_fields(&self) -> bool {
        self.instructions.is_some()
            || self.context.is_some()
            || self.examples.is_some()
            || self.targets.is_some()
    }

    fn has_top_level_plugins(&self) -> bool {
        self.mcp_servers.is_some()
            || self.commands.is_some()
            || self.agents.is_some()
            || self.hooks.is_some()
    }

    /// Best guess at the version of a document that does not declare one
    fn inferred_version(&self) -> SchemaVersion {
        if self.has_legacy_fields() && self.content.is_none() {
            SchemaVersion::V1
        } else if self.plugins.is_some() && !self.has_top_level_plugins() {
            SchemaVersion::V2_1
        } else {
            SchemaVersion::LATEST
        }
    }

    fn take_top_level_plugins(&mut self) -> PluginSet {
        PluginSet {
            mcp_servers: self.mcp_servers.take().unwrap_or_default(),
            commands: self.commands.take().unwrap_or_default(),
            agents: self.agents.take().unwrap_or_default(),
            hooks: self.hooks.take().unwrap_or_default(),
        }
    }
}

/// A versioned canonical document
///
/// Values are treated as immutable between pipeline stages: adapters read
/// them, the migrator and merge engine return new ones.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalDocument {
    pub schema_version: SchemaVersion,
    pub metadata: Metadata,

    /// Schema 1.0 only
    pub legacy: Option<LegacyBody>,

    /// Primary markdown body (schema 2.0+)
    pub content: String,

    pub variables: VariableTable,
    pub documents: Vec<DocumentBlock>,

    /// Schema 2.1+ (nested in 2.1, top-level from 3.0)
    pub plugins: PluginSet,
}

impl CanonicalDocument {
    /// A latest-version document with the given title and body
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            schema_version: SchemaVersion::LATEST,
            metadata: Metadata::new(title),
            legacy: None,
            content: content.into(),
            variables: VariableTable::new(),
            documents: Vec::new(),
            plugins: PluginSet::default(),
        }
    }

    /// An empty latest-version document
    pub fn empty() -> Self {
        Self::new("", "")
    }

    /// A schema 1.0 document with structured instructions
    pub fn legacy(metadata: Metadata, body: LegacyBody) -> Self {
        Self {
            schema_version: SchemaVersion::V1,
            metadata,
            legacy: Some(body),
            content: String::new(),
            variables: VariableTable::new(),
            documents: Vec::new(),
            plugins: PluginSet::default(),
        }
    }

    /// Builds a document from its on-disk layout, dropping fields that are
    /// illegal for the declared version
    pub fn from_raw(mut raw: RawDocument) -> (Self, Vec<DocumentNote>) {
        let mut notes = Vec::new();

        let version = match raw.schema_version {
            Some(version) => version,
            None => {
                let inferred = raw.inferred_version();
                notes.push(DocumentNote::new(
                    "schemaVersion",
                    format!("missing, inferred {}", inferred),
                ));
                inferred
            }
        };

        let legacy = if raw.has_legacy_fields() {
            Some(LegacyBody {
                instructions: raw.instructions.take().unwrap_or_default(),
                context: raw.context.take().unwrap_or_default(),
                examples: raw.examples.take().unwrap_or_default(),
                targets: raw.targets.take().unwrap_or_default(),
            })
        } else {
            None
        };

        let has_top_level = raw.has_top_level_plugins();
        let top_level = raw.take_top_level_plugins();
        let nested = raw.plugins.take();

        let plugins = if version.nests_plugins() {
            if has_top_level {
                notes.push(DocumentNote::new(
                    "mcpServers/commands/agents/hooks",
                    format!("top-level plugin fields are not legal in schema {}; dropped", version),
                ));
            }
            nested.unwrap_or_default()
        } else if version.supports_plugins() {
            if nested.is_some() {
                notes.push(DocumentNote::new(
                    "plugins",
                    format!("nested plugins are not legal in schema {}; dropped", version),
                ));
            }
            top_level
        } else {
            if nested.is_some() || has_top_level {
                notes.push(DocumentNote::new(
                    "plugins",
                    format!("plugins are not legal in schema {}; dropped", version),
                ));
            }
            PluginSet::default()
        };

        let mut doc = Self {
            schema_version: version,
            metadata: raw.metadata,
            legacy,
            content: raw.content.unwrap_or_default(),
            variables: raw.variables.unwrap_or_default(),
            documents: raw.documents.unwrap_or_default(),
            plugins,
        };

        notes.extend(doc.enforce_legality());
        (doc, notes)
    }

    /// Converts to the on-disk layout for this document's version
    pub fn to_raw(&self) -> RawDocument {
        let version = self.schema_version;
        let mut raw = RawDocument {
            schema_version: Some(version),
            metadata: self.metadata.clone(),
            instructions: None,
            context: None,
            examples: None,
            targets: None,
            content: None,
            variables: (!self.variables.is_empty()).then(|| self.variables.clone()),
            documents: None,
            plugins: None,
            mcp_servers: None,
            commands: None,
            agents: None,
            hooks: None,
        };

        if version.is_legacy() {
            let body = self.legacy.clone().unwrap_or_default();
            raw.instructions = Some(body.instructions);
            raw.context = Some(body.context);
            raw.examples = (!body.examples.is_empty()).then_some(body.examples);
            raw.targets = (!body.targets.is_empty()).then_some(body.targets);
            return raw;
        }

        raw.content = Some(self.content.clone());
        raw.documents = (!self.documents.is_empty()).then(|| self.documents.clone());

        if self.plugins.is_empty() || !version.supports_plugins() {
            return raw;
        }

        if version.nests_plugins() {
            raw.plugins = Some(self.plugins.clone());
        } else {
            let set = self.plugins.clone();
            raw.mcp_servers = (!set.mcp_servers.is_empty()).then_some(set.mcp_servers);
            raw.commands = (!set.commands.is_empty()).then_some(set.commands);
            raw.agents = (!set.agents.is_empty()).then_some(set.agents);
            raw.hooks = (!set.hooks.is_empty()).then_some(set.hooks);
        }

        raw
    }

    /// Drops in-memory fields that the declared version does not allow
    pub fn enforce_legality(&mut self) -> Vec<DocumentNote> {
        let version = self.schema_version;
        let mut notes = Vec::new();

        if version.is_legacy() {
            if !self.content.is_empty() {
                self.content.clear();
                notes.push(DocumentNote::new("content", "not legal in schema 1.0; dropped"));
            }
            if !self.documents.is_empty() {
                self.documents.clear();
                notes.push(DocumentNote::new("documents", "not legal in schema 1.0; dropped"));
            }
        } else if self.legacy.take().is_some() {
            notes.push(DocumentNote::new(
                "instructions/context/examples/targets",
                format!("only legal in schema 1.0, document is {}; dropped", version),
            ));
        }

        if !version.supports_plugins() && !self.plugins.is_empty() {
            self.plugins = PluginSet::default();
            notes.push(DocumentNote::new(
                "plugins",
                format!("not legal in schema {}; dropped", version),
            ));
        }

        if !version.supports_workflows() {
            for command in &mut self.plugins.commands {
                if command.strip_workflow_fields() {
                    notes.push(DocumentNote::new(
                        format!("commands.{}", command.name),
                        format!("workflow fields are not legal in schema {}; dropped", version),
                    ));
                }
            }
        }

        for (kind, name) in self.plugins.dedupe_names() {
            notes.push(DocumentNote::new(
                format!("{}.{}", kind, name),
                "duplicate name; later entry dropped",
            ));
        }

        self.metadata.normalize_tags();
        notes
    }

    /// Parses a YAML canonical document
    pub fn from_yaml(text: &str) -> Result<(Self, Vec<DocumentNote>), serde_yaml::Error> {
        let raw: RawDocument = serde_yaml::from_str(text)?;
        Ok(Self::from_raw(raw))
    }

    /// Renders the document as YAML in its version's layout
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_raw())
    }
}

impl Serialize for CanonicalDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_raw().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CanonicalDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawDocument::deserialize(deserializer)?;
        let (doc, notes) = Self::from_raw(raw);
        for note in notes {
            tracing::warn!(field = %note.field, "{}", note.message);
        }
        Ok(doc)
    }
}

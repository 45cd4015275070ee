//! Domain models for promptsync
//!
//! The canonical document, its migrations, variable handling and the merge
//! engine. Contains no I/O.

mod document;
mod merge;
mod migrate;
mod plugins;
mod variables;

pub use document::{
    CanonicalDocument, DocumentBlock, DocumentNote, LegacyBody, LegacyContext, LegacyExample,
    LegacyInstructions, Metadata, RawDocument, SchemaVersion,
};
pub use merge::{concatenate_dedup, merge, merge_restoring, ListMerge, MergeOutcome, MergeWarning};
pub use migrate::{migrate, migrate_to_latest, Migrated, MigrationError};
pub use plugins::{Agent, Command, CommandStep, Hook, McpServer, Named, PluginKind, PluginSet};
pub use variables::{
    builtin_variables, is_valid_name, placeholder, referenced_names, restore, substitute, Bindings,
    VariableBinding, VariableLayers, VariableOrigin, VariableTable,
};

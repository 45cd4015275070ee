//! Sync engine
//!
//! The four operations exposed to callers:
//!
//! | Operation | Direction |
//! |-----------|-----------|
//! | [`Engine::generate`] | document → native files for one adapter |
//! | [`Engine::sync`] | native files → merged document for one adapter |
//! | [`Engine::migrate`] | document → newer schema version |
//! | [`Engine::capabilities_of`] | adapter name → capability set |
//!
//! plus batch forms ([`Engine::generate_all`], [`Engine::sync_all`]) that
//! keep going when one adapter fails and report partial success explicitly.

use std::path::{Path, PathBuf};
use std::thread;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::adapter::{
    AdapterCapabilitySet, AdapterRegistry, DecodeError, EncodeError, FileScope, FormatAdapter,
};
use crate::domain::{
    self, Bindings, CanonicalDocument, DocumentNote, MergeWarning, Migrated, MigrationError,
    SchemaVersion, VariableLayers, VariableTable,
};
use crate::storage::write_atomic;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown adapter: {0}")]
    UnknownAdapter(String),

    #[error("{adapter} does not support {operation}")]
    NotSupported {
        adapter: String,
        operation: &'static str,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Source of "now" for builtin variables and timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Files written for one adapter
#[derive(Debug, Clone)]
pub struct Generated {
    pub adapter: String,

    /// Directory the adapter's relative paths were resolved against
    pub root: PathBuf,

    /// Absolute paths, in the order the adapter produced them
    pub files: Vec<PathBuf>,

    /// Resolved variable values used for substitution
    pub bindings: Bindings,

    /// Placeholders left in the output because no layer binds them
    pub unresolved: Vec<String>,
}

/// Outcome of syncing one adapter
#[derive(Debug, Clone)]
pub struct Synced {
    pub adapter: String,
    pub document: CanonicalDocument,
    pub warnings: Vec<MergeWarning>,
    pub notes: Vec<DocumentNote>,

    /// False when the adapter found no native files
    pub found: bool,

    /// True when the document differs from the one passed in
    pub changed: bool,
}

/// Per-adapter results of a batch operation
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(String, EngineError)>,
}

impl<T> BatchReport<T> {
    fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Some adapters succeeded and some failed
    pub fn is_partial(&self) -> bool {
        !self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

/// Result of [`Engine::sync_all`]
#[derive(Debug)]
pub struct SyncReport {
    /// The document after every successful adapter was merged in; `None`
    /// when nothing existed and no adapter found native files
    pub document: Option<CanonicalDocument>,
    pub batch: BatchReport<Synced>,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.batch.succeeded.iter().any(|s| s.changed)
    }
}

/// Dispatches generate/sync requests to registered adapters
pub struct Engine {
    registry: AdapterRegistry,
    clock: Box<dyn Clock>,
    system_root: Option<PathBuf>,
    parallel: bool,
    local_variables: VariableTable,
}

impl Engine {
    /// Engine over `registry` using the system clock and the user's home as
    /// the system-wide root
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            clock: Box::new(SystemClock),
            system_root: directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()),
            parallel: true,
            local_variables: VariableTable::new(),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_system_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.system_root = Some(root.into());
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Local-file values that sync turns back into placeholders alongside
    /// the document's own variables
    pub fn with_local_variables(mut self, table: VariableTable) -> Self {
        self.local_variables = table;
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn adapter(&self, name: &str) -> Result<&dyn FormatAdapter, EngineError> {
        self.registry
            .get(name)
            .ok_or_else(|| EngineError::UnknownAdapter(name.to_string()))
    }

    pub fn capabilities_of(&self, adapter: &str) -> Result<AdapterCapabilitySet, EngineError> {
        Ok(self.adapter(adapter)?.capabilities())
    }

    /// Migrates `doc` to `target`; downgrades are rejected
    pub fn migrate(&self, doc: CanonicalDocument, target: SchemaVersion) -> Result<Migrated, MigrationError> {
        domain::migrate(doc, target)
    }

    fn root_for(&self, adapter: &dyn FormatAdapter, target_dir: &Path) -> Result<PathBuf, EngineError> {
        match adapter.capabilities().file_location_scope {
            FileScope::Project | FileScope::None => Ok(target_dir.to_path_buf()),
            FileScope::SystemWide => self.system_root.clone().ok_or_else(|| EngineError::NotSupported {
                adapter: adapter.name().to_string(),
                operation: "system-wide files without a home directory",
            }),
        }
    }

    /// Renders `doc` with one adapter and writes its files atomically
    pub fn generate(
        &self,
        doc: &CanonicalDocument,
        adapter: &str,
        target_dir: &Path,
        layers: &VariableLayers,
    ) -> Result<Generated, EngineError> {
        let adapter = self.adapter(adapter)?;
        if !adapter.capabilities().supports_generate {
            return Err(EngineError::NotSupported {
                adapter: adapter.name().to_string(),
                operation: "generate",
            });
        }

        // Adapters render the 2.0+ body, so 1.0 documents are upgraded in memory
        let upgraded;
        let doc = if doc.schema_version.is_legacy() {
            upgraded = domain::migrate_to_latest(doc.clone()).document;
            &upgraded
        } else {
            doc
        };

        let bindings = Bindings::resolve(doc, layers, self.clock.now());
        let writes = adapter.encode(doc, &bindings)?;
        let root = self.root_for(adapter, target_dir)?;

        let mut unresolved: Vec<String> = Vec::new();
        for name in writes.iter().flat_map(|w| domain::referenced_names(&w.contents)) {
            if !unresolved.contains(&name) {
                unresolved.push(name);
            }
        }
        if !unresolved.is_empty() {
            tracing::warn!(adapter = adapter.name(), names = ?unresolved, "unresolved placeholders");
        }

        let mut files = Vec::with_capacity(writes.len());
        for write in writes {
            let path = root.join(&write.path);
            write_atomic(&path, write.contents.as_bytes()).map_err(|source| EncodeError::WriteFailure {
                adapter: adapter.name().to_string(),
                path: path.clone(),
                source,
            })?;
            tracing::debug!(adapter = adapter.name(), path = %path.display(), "wrote");
            files.push(path);
        }

        tracing::info!(adapter = adapter.name(), files = files.len(), "generated");
        Ok(Generated {
            adapter: adapter.name().to_string(),
            root,
            files,
            bindings,
            unresolved,
        })
    }

    /// Generates for several adapters. One adapter's failure never stops the
    /// others; results keep the order of `adapters`.
    pub fn generate_all(
        &self,
        doc: &CanonicalDocument,
        adapters: &[String],
        target_dir: &Path,
        layers: &VariableLayers,
    ) -> BatchReport<Generated> {
        let results: Vec<(String, Result<Generated, EngineError>)> = if self.parallel && adapters.len() > 1 {
            thread::scope(|scope| {
                let handles: Vec<_> = adapters
                    .iter()
                    .map(|name| {
                        let handle = scope.spawn(move || self.generate(doc, name, target_dir, layers));
                        (name, handle)
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|(name, handle)| {
                        let result = handle.join().unwrap_or_else(|_| {
                            Err(EngineError::Encode(EncodeError::render(name, "worker thread panicked")))
                        });
                        (name.clone(), result)
                    })
                    .collect()
            })
        } else {
            adapters
                .iter()
                .map(|name| (name.clone(), self.generate(doc, name, target_dir, layers)))
                .collect()
        };

        let mut report = BatchReport::new();
        for (name, result) in results {
            match result {
                Ok(generated) => report.succeeded.push(generated),
                Err(e) => {
                    tracing::warn!(adapter = %name, error = %e, "generate failed");
                    report.failed.push((name, e));
                }
            }
        }
        report
    }

    /// Decodes one adapter's native files and merges them into `existing`
    pub fn sync(
        &self,
        adapter: &str,
        source_dir: &Path,
        existing: Option<&CanonicalDocument>,
    ) -> Result<Synced, EngineError> {
        let adapter = self.adapter(adapter)?;
        if !adapter.capabilities().supports_parse {
            return Err(EngineError::NotSupported {
                adapter: adapter.name().to_string(),
                operation: "parse",
            });
        }

        let decoded = match adapter.decode(source_dir) {
            Ok(decoded) => decoded,
            Err(e) if e.is_not_found() => {
                tracing::info!(adapter = adapter.name(), "no native files; nothing to merge");
                let document = existing.cloned().unwrap_or_else(CanonicalDocument::empty);
                return Ok(Synced {
                    adapter: adapter.name().to_string(),
                    document,
                    warnings: Vec::new(),
                    notes: vec![DocumentNote::new(adapter.name(), e.to_string())],
                    found: false,
                    changed: false,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = domain::merge_restoring(existing, decoded, adapter.merge_policy(), &self.local_variables);
        let mut document = outcome.document;

        let changed = existing != Some(&document);
        if changed {
            let now = self.clock.now();
            if existing.is_none() && document.metadata.created.is_none() {
                document.metadata.created = Some(now);
            }
            document.metadata.updated = Some(now);
        }

        tracing::info!(adapter = adapter.name(), changed, "synced");
        Ok(Synced {
            adapter: adapter.name().to_string(),
            document,
            warnings: outcome.warnings,
            notes: outcome.notes,
            found: true,
            changed,
        })
    }

    /// Syncs several adapters in order, feeding each merged document into
    /// the next. A malformed adapter is reported and skipped.
    pub fn sync_all(&self, adapters: &[String], source_dir: &Path, existing: Option<&CanonicalDocument>) -> SyncReport {
        let mut current = existing.cloned();
        let mut batch = BatchReport::new();

        for name in adapters {
            match self.sync(name, source_dir, current.as_ref()) {
                Ok(synced) => {
                    if synced.found {
                        current = Some(synced.document.clone());
                    }
                    batch.succeeded.push(synced);
                }
                Err(e) => {
                    tracing::warn!(adapter = %name, error = %e, "sync failed");
                    batch.failed.push((name.clone(), e));
                }
            }
        }

        SyncReport {
            document: current,
            batch,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(AdapterRegistry::builtin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Command, VariableTable};
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 30, 0).unwrap()
    }

    fn engine(system_root: &Path) -> Engine {
        Engine::new(AdapterRegistry::builtin())
            .with_clock(FixedClock(now()))
            .with_system_root(system_root)
    }

    fn sample() -> CanonicalDocument {
        let mut doc = CanonicalDocument::new("Acme", "Hello {{NAME}}");
        doc.variables.insert("NAME", "Foo");
        doc
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn generate_writes_substituted_files() {
        let project = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let engine = engine(home.path());

        let generated = engine
            .generate(&sample(), "agents-md", project.path(), &VariableLayers::default())
            .unwrap();

        assert_eq!(generated.files, vec![project.path().join("AGENTS.md")]);
        let text = fs::read_to_string(project.path().join("AGENTS.md")).unwrap();
        assert!(text.contains("Hello Foo"));
    }

    #[test]
    fn overrides_win_over_document_variables() {
        let project = TempDir::new().unwrap();
        let engine = engine(project.path());
        let layers = VariableLayers::overrides(VariableTable::from_assignments(["NAME=Bar"]).unwrap());

        engine.generate(&sample(), "agents-md", project.path(), &layers).unwrap();

        let text = fs::read_to_string(project.path().join("AGENTS.md")).unwrap();
        assert!(text.contains("Hello Bar"));
    }

    #[test]
    fn unbound_placeholders_are_reported() {
        let project = TempDir::new().unwrap();
        let engine = engine(project.path());
        let doc = CanonicalDocument::new("Acme", "Hello {{NAME}} from {{TEAM}} and {{TEAM}}");

        let generated = engine
            .generate(&doc, "agents-md", project.path(), &VariableLayers::default())
            .unwrap();
        assert_eq!(generated.unresolved, names(&["NAME", "TEAM"]));

        let bound = engine
            .generate(&sample(), "agents-md", project.path(), &VariableLayers::default())
            .unwrap();
        assert!(bound.unresolved.is_empty());
    }

    #[test]
    fn sync_restores_local_values() {
        let project = TempDir::new().unwrap();
        let local = VariableTable::from_assignments(["API_TOKEN=s3cr3t-XYZ"]).unwrap();
        let engine = engine(project.path()).with_local_variables(local.clone());
        let doc = CanonicalDocument::new("Acme", "Call the API with {{API_TOKEN}}.");

        let layers = VariableLayers::new(local, VariableTable::new());
        engine.generate(&doc, "agents-md", project.path(), &layers).unwrap();

        let path = project.path().join("AGENTS.md");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("s3cr3t-XYZ"));
        fs::write(&path, text.replace("API with s3cr3t-XYZ.", "API with s3cr3t-XYZ. Retry once.")).unwrap();

        let synced = engine.sync("agents-md", project.path(), Some(&doc)).unwrap();
        assert_eq!(synced.document.content, "Call the API with {{API_TOKEN}}. Retry once.");
        assert!(!synced.document.to_yaml().unwrap().contains("s3cr3t-XYZ"));
        assert!(synced.document.variables.is_empty());
    }

    #[test]
    fn legacy_documents_render_their_instructions() {
        let project = TempDir::new().unwrap();
        let engine = engine(project.path());
        let yaml = "schemaVersion: \"1.0\"\nmetadata:\n  title: Old\ninstructions:\n  general: [Prefer small functions]\n";
        let (doc, _) = CanonicalDocument::from_yaml(yaml).unwrap();

        engine
            .generate(&doc, "agents-md", project.path(), &VariableLayers::default())
            .unwrap();

        let text = fs::read_to_string(project.path().join("AGENTS.md")).unwrap();
        assert!(text.contains("Prefer small functions"));
    }

    #[test]
    fn builtins_use_injected_clock() {
        let project = TempDir::new().unwrap();
        let engine = engine(project.path());
        let doc = CanonicalDocument::new("Acme", "Generated {{CURRENT_DATE}}");

        engine
            .generate(&doc, "agents-md", project.path(), &VariableLayers::default())
            .unwrap();

        let text = fs::read_to_string(project.path().join("AGENTS.md")).unwrap();
        assert!(text.contains("Generated 2025-01-15"));
    }

    #[test]
    fn system_wide_adapter_writes_under_system_root() {
        let project = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();
        let engine = engine(home.path());

        let generated = engine
            .generate(&sample(), "windsurf-global", project.path(), &VariableLayers::default())
            .unwrap();

        assert_eq!(generated.root, home.path());
        assert!(home.path().join(".codeium/windsurf/memories/global_rules.md").exists());
        assert_eq!(fs::read_dir(project.path()).unwrap().count(), 0);
    }

    #[test]
    fn unknown_adapter() {
        let dir = TempDir::new().unwrap();
        let err = engine(dir.path()).capabilities_of("vim").unwrap_err();
        assert!(matches!(err, EngineError::UnknownAdapter(name) if name == "vim"));
    }

    #[test]
    fn sync_rejects_generate_only_adapter() {
        let dir = TempDir::new().unwrap();
        let err = engine(dir.path()).sync("windsurf-global", dir.path(), None).unwrap_err();
        assert!(matches!(err, EngineError::NotSupported { operation: "parse", .. }));
    }

    #[test]
    fn generate_all_reports_partial_success() {
        let project = TempDir::new().unwrap();
        // a directory where the file should go makes the write fail
        fs::create_dir_all(project.path().join("AGENTS.md/blocker")).unwrap();
        let engine = engine(project.path());

        let report = engine.generate_all(
            &sample(),
            &names(&["agents-md", "cursor", "nope"]),
            project.path(),
            &VariableLayers::default(),
        );

        assert!(report.is_partial());
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].adapter, "cursor");
        let failed: Vec<_> = report.failed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(failed, vec!["agents-md", "nope"]);
        assert!(matches!(
            report.failed[0].1,
            EngineError::Encode(EncodeError::WriteFailure { .. })
        ));
    }

    #[test]
    fn generate_all_sequential_matches_parallel() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let adapters = names(&["agents-md", "cursor", "claude", "continue"]);

        engine(a.path()).generate_all(&sample(), &adapters, a.path(), &VariableLayers::default());
        engine(b.path())
            .with_parallel(false)
            .generate_all(&sample(), &adapters, b.path(), &VariableLayers::default());

        for file in ["AGENTS.md", ".cursor/rules/main.mdc", "CLAUDE.md", ".continue/config.json"] {
            assert_eq!(
                fs::read_to_string(a.path().join(file)).unwrap(),
                fs::read_to_string(b.path().join(file)).unwrap()
            );
        }
    }

    #[test]
    fn sync_scenario_restores_and_stamps() {
        let project = TempDir::new().unwrap();
        let engine = engine(project.path());
        let existing = sample();

        engine
            .generate(&existing, "agents-md", project.path(), &VariableLayers::default())
            .unwrap();
        let path = project.path().join("AGENTS.md");
        let edited = fs::read_to_string(&path).unwrap().replace("Hello Foo", "Hello Foo, welcome");
        fs::write(&path, edited).unwrap();

        let synced = engine.sync("agents-md", project.path(), Some(&existing)).unwrap();

        assert!(synced.changed);
        assert_eq!(synced.document.content, "Hello {{NAME}}, welcome");
        assert_eq!(synced.document.variables, existing.variables);
        assert_eq!(synced.document.metadata.updated, Some(now()));
    }

    #[test]
    fn sync_twice_equals_sync_once() {
        let project = TempDir::new().unwrap();
        let engine = engine(project.path());
        let mut existing = sample();
        existing.plugins.commands.push(Command::new("test", "Run tests"));

        engine
            .generate(&existing, "windsurf", project.path(), &VariableLayers::default())
            .unwrap();
        fs::write(
            project.path().join(".windsurfrules"),
            "# Acme\n\nHello Foo\n- Prefer small PRs\n",
        )
        .unwrap();

        let once = engine.sync("windsurf", project.path(), Some(&existing)).unwrap();
        let twice = engine.sync("windsurf", project.path(), Some(&once.document)).unwrap();

        assert!(once.changed);
        assert!(!twice.changed);
        assert_eq!(twice.document, once.document);
        assert_eq!(once.document.plugins.commands.len(), 1);
    }

    #[test]
    fn sync_not_found_keeps_existing() {
        let project = TempDir::new().unwrap();
        let engine = engine(project.path());
        let existing = sample();

        let synced = engine.sync("cursor", project.path(), Some(&existing)).unwrap();

        assert!(!synced.found);
        assert!(!synced.changed);
        assert_eq!(synced.document, existing);
        assert_eq!(synced.notes.len(), 1);

        let fresh = engine.sync("cursor", project.path(), None).unwrap();
        assert_eq!(fresh.document, CanonicalDocument::empty());
    }

    #[test]
    fn sync_without_existing_stamps_created() {
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("AGENTS.md"), "# Found\n\nSome rules\n").unwrap();
        let engine = engine(project.path());

        let synced = engine.sync("agents-md", project.path(), None).unwrap();

        assert_eq!(synced.document.metadata.title, "Found");
        assert_eq!(synced.document.metadata.created, Some(now()));
        assert_eq!(synced.document.schema_version, SchemaVersion::LATEST);
    }

    #[test]
    fn sync_all_continues_past_malformed() {
        let project = TempDir::new().unwrap();
        fs::create_dir_all(project.path().join(".continue")).unwrap();
        fs::write(project.path().join(".continue/config.json"), "{ broken").unwrap();
        fs::write(project.path().join("AGENTS.md"), "Hello Foo from agents\n").unwrap();
        let engine = engine(project.path());
        let existing = sample();

        let report = engine.sync_all(&names(&["continue", "agents-md", "cursor"]), project.path(), Some(&existing));

        assert!(report.batch.is_partial());
        assert_eq!(report.batch.failed[0].0, "continue");
        assert!(matches!(
            report.batch.failed[0].1,
            EngineError::Decode(DecodeError::Malformed { .. })
        ));
        assert!(report.changed());
        let doc = report.document.unwrap();
        assert_eq!(doc.content, "Hello {{NAME}} from agents");
    }

    #[test]
    fn migrate_delegates() {
        let dir = TempDir::new().unwrap();
        let engine = engine(dir.path());
        let doc = CanonicalDocument::new("Demo", "Body");

        let err = engine.migrate(doc, SchemaVersion::V2_0).unwrap_err();
        assert_eq!(
            err,
            MigrationError::IllegalDowngrade {
                from: SchemaVersion::V3_1,
                to: SchemaVersion::V2_0,
            }
        );
    }
}

//! Single-file markdown formats (`AGENTS.md`, `.windsurfrules`)
//!
//! The whole document is rendered into one file. Document blocks keep their
//! name and content only; plugins have no representation.

use std::path::Path;

use crate::domain::{Bindings, CanonicalDocument, DocumentBlock, ListMerge};

use super::{read_native, sections, AdapterCapabilitySet, DecodeError, EncodeError, FileWrite, FormatAdapter};

/// A single markdown file at a fixed project-relative path
#[derive(Debug, Clone)]
pub struct MarkdownFileAdapter {
    name: &'static str,
    file: &'static str,
    policy: ListMerge,
}

impl MarkdownFileAdapter {
    pub const fn new(name: &'static str, file: &'static str, policy: ListMerge) -> Self {
        Self { name, file, policy }
    }

    /// `AGENTS.md`, read back wholesale
    pub const fn agents_md() -> Self {
        Self::new("agents-md", "AGENTS.md", ListMerge::Replace)
    }

    /// `.windsurfrules`, a bullet list that users append to by hand
    pub const fn windsurf() -> Self {
        Self::new("windsurf", ".windsurfrules", ListMerge::Concatenate)
    }
}

/// Substitutes every text field that single-file layouts carry
pub(crate) fn render_substituted(doc: &CanonicalDocument, bindings: &Bindings) -> String {
    let documents: Vec<DocumentBlock> = doc
        .documents
        .iter()
        .map(|block| DocumentBlock::new(bindings.substitute(&block.name), bindings.substitute(&block.content)))
        .collect();

    sections::render(
        &bindings.substitute(&doc.metadata.title),
        &bindings.substitute(&doc.metadata.description),
        &bindings.substitute(&doc.content),
        &documents,
    )
}

impl FormatAdapter for MarkdownFileAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> AdapterCapabilitySet {
        AdapterCapabilitySet::bidirectional()
    }

    fn merge_policy(&self) -> ListMerge {
        self.policy
    }

    fn locations(&self) -> Vec<String> {
        vec![self.file.to_string()]
    }

    fn encode(&self, doc: &CanonicalDocument, bindings: &Bindings) -> Result<Vec<FileWrite>, EncodeError> {
        Ok(vec![FileWrite::new(self.file, render_substituted(doc, bindings))])
    }

    fn decode(&self, source_dir: &Path) -> Result<CanonicalDocument, DecodeError> {
        let path = source_dir.join(self.file);
        let text = read_native(self.name, &path)?.ok_or_else(|| DecodeError::NotFound {
            adapter: self.name.to_string(),
            path: path.clone(),
        })?;

        tracing::debug!(adapter = self.name, path = %path.display(), "decoding");
        Ok(sections::parse(&text).into_document())
    }
}

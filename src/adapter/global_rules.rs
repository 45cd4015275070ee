//! Windsurf global rules (`~/.codeium/windsurf/memories/global_rules.md`)
//!
//! Generate-only. The file applies to every workspace on the machine, so it
//! is never read back into a project's document.

use crate::domain::{Bindings, CanonicalDocument};

use super::markdown_file::render_substituted;
use super::{AdapterCapabilitySet, EncodeError, FileWrite, FormatAdapter};

const NAME: &str = "windsurf-global";
const GLOBAL_RULES: &str = ".codeium/windsurf/memories/global_rules.md";

/// Windsurf ignores global rules beyond this many characters
pub const CHARACTER_LIMIT: usize = 6000;

#[derive(Debug, Clone, Copy, Default)]
pub struct WindsurfGlobalAdapter;

impl FormatAdapter for WindsurfGlobalAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilitySet {
        AdapterCapabilitySet::system_wide_generate_only()
    }

    fn locations(&self) -> Vec<String> {
        vec![format!("~/{}", GLOBAL_RULES)]
    }

    fn encode(&self, doc: &CanonicalDocument, bindings: &Bindings) -> Result<Vec<FileWrite>, EncodeError> {
        let text = render_substituted(doc, bindings);

        let length = text.chars().count();
        if length > CHARACTER_LIMIT {
            tracing::warn!(
                adapter = NAME,
                length,
                limit = CHARACTER_LIMIT,
                "global rules exceed the character limit and will be truncated by the editor"
            );
        }

        Ok(vec![FileWrite::new(GLOBAL_RULES, text)])
    }
}

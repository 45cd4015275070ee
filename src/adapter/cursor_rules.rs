//! Cursor project rules (`.cursor/rules/*.mdc`)
//!
//! The primary content goes to `main.mdc` with `alwaysApply: true`; every
//! document block becomes its own rule file carrying its globs and
//! description in frontmatter. Rule files are named by slug; a block whose
//! name is not its slug also records `name`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{Bindings, CanonicalDocument, DocumentBlock};

use super::{
    file_stem, frontmatter, list_files, read_native, unique_slugs, AdapterCapabilitySet, DecodeError,
    EncodeError, FileWrite, FormatAdapter,
};

const NAME: &str = "cursor";
const RULES_DIR: &str = ".cursor/rules";
const MAIN_RULE: &str = "main";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleFrontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default, deserialize_with = "globs_from_any", skip_serializing_if = "Vec::is_empty")]
    globs: Vec<String>,

    #[serde(default)]
    always_apply: bool,
}

/// Cursor accepts globs as a comma-separated string or a list
fn globs_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let globs = match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s.split(',').map(str::to_string).collect(),
        Some(OneOrMany::Many(list)) => list,
    };

    Ok(globs
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect())
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

fn rule_path(stem: &str) -> PathBuf {
    Path::new(RULES_DIR).join(format!("{}.mdc", stem))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CursorRulesAdapter;

impl FormatAdapter for CursorRulesAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilitySet {
        AdapterCapabilitySet::bidirectional()
    }

    fn locations(&self) -> Vec<String> {
        vec![format!("{}/*.mdc", RULES_DIR)]
    }

    fn encode(&self, doc: &CanonicalDocument, bindings: &Bindings) -> Result<Vec<FileWrite>, EncodeError> {
        let mut files = Vec::with_capacity(doc.documents.len() + 1);

        let main = RuleFrontmatter {
            name: None,
            description: non_empty(bindings.substitute(&doc.metadata.description)),
            globs: Vec::new(),
            always_apply: true,
        };
        let text = frontmatter::render(&main, &bindings.substitute(&doc.content))
            .map_err(|e| EncodeError::render(NAME, e))?;
        files.push(FileWrite::new(rule_path(MAIN_RULE), text));

        let stems = unique_slugs(doc.documents.iter().map(|b| b.name.as_str()), &[MAIN_RULE]);
        for (block, stem) in doc.documents.iter().zip(stems) {
            let rule = RuleFrontmatter {
                name: (block.name != stem).then(|| block.name.clone()),
                description: block
                    .description
                    .as_deref()
                    .map(|d| bindings.substitute(d))
                    .and_then(non_empty),
                globs: block.file_globs.clone(),
                always_apply: false,
            };
            let text = frontmatter::render(&rule, &bindings.substitute(&block.content))
                .map_err(|e| EncodeError::render(NAME, e))?;
            files.push(FileWrite::new(rule_path(&stem), text));
        }

        Ok(files)
    }

    fn decode(&self, source_dir: &Path) -> Result<CanonicalDocument, DecodeError> {
        let dir = source_dir.join(RULES_DIR);
        let paths = list_files(NAME, &dir, "mdc")?;
        if paths.is_empty() {
            return Err(DecodeError::NotFound {
                adapter: NAME.to_string(),
                path: dir,
            });
        }

        let mut doc = CanonicalDocument::empty();

        for path in paths {
            let Some(text) = read_native(NAME, &path)? else {
                continue;
            };
            let (rule, body): (RuleFrontmatter, _) =
                frontmatter::parse(&text).map_err(|reason| DecodeError::malformed(NAME, &path, reason))?;

            let stem = file_stem(&path);
            tracing::debug!(adapter = NAME, rule = %stem, "decoding rule");

            if stem == MAIN_RULE {
                doc.content = body.trim().to_string();
                doc.metadata.description = rule.description.unwrap_or_default();
            } else {
                let name = rule.name.filter(|n| !n.trim().is_empty()).unwrap_or(stem);
                doc.documents.push(DocumentBlock {
                    name,
                    content: body.trim().to_string(),
                    file_globs: rule.globs,
                    description: rule.description.and_then(non_empty),
                });
            }
        }

        Ok(doc)
    }
}

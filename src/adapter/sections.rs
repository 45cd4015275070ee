//! Markdown layout shared by the single-file formats
//!
//! ```text
//! # {title}
//!
//! > {description}
//!
//! {content}
//!
//! <!-- document: {name} -->
//!
//! {document content}
//! ```
//!
//! Every part is optional. Document blocks are introduced by an HTML comment
//! so that headings inside the content never split it. When the content
//! itself starts with `# ` or `>` and the part it would be mistaken for is
//! absent, a `<!-- content -->` line marks where the content begins.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{CanonicalDocument, DocumentBlock};

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"(?m)^<!--\s*document:\s*(.+?)\s*-->[ \t]*$").expect("Invalid regex")
    })
}

fn content_marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"(?m)^<!--\s*content\s*-->[ \t]*$").expect("Invalid regex"))
}

const CONTENT_MARKER: &str = "<!-- content -->";

/// Markdown parts recovered from a native file
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MarkdownParts {
    pub title: String,
    pub description: String,
    pub content: String,
    pub documents: Vec<DocumentBlock>,
}

impl MarkdownParts {
    /// A latest-version candidate document built from the parts
    pub fn into_document(self) -> CanonicalDocument {
        let mut doc = CanonicalDocument::new(self.title, self.content);
        doc.metadata.description = self.description;
        doc.documents = self.documents;
        doc
    }
}

fn quote(text: &str) -> String {
    text.trim()
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                ">".to_string()
            } else {
                format!("> {}", line.trim_end())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders already-substituted parts
pub fn render(title: &str, description: &str, content: &str, documents: &[DocumentBlock]) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !title.trim().is_empty() {
        parts.push(format!("# {}", title.trim()));
    }
    if !description.trim().is_empty() {
        parts.push(quote(description));
    }
    let content = content.trim();
    if !content.is_empty() {
        let reads_as_title = content.starts_with("# ") && title.trim().is_empty() && description.trim().is_empty();
        let reads_as_description = content.starts_with('>') && description.trim().is_empty();
        if reads_as_title || reads_as_description {
            parts.push(CONTENT_MARKER.to_string());
        }
        parts.push(content.to_string());
    }
    for block in documents {
        let name = block.name.replace(['\n', '\r'], " ");
        parts.push(format!("<!-- document: {} -->", name.trim()));
        if !block.content.trim().is_empty() {
            parts.push(block.content.trim().to_string());
        }
    }

    let mut out = parts.join("\n\n");
    out.push('\n');
    out
}

/// Parses the layout produced by [`render`]. Hand-written files without a
/// title or description parse as plain content.
pub fn parse(text: &str) -> MarkdownParts {
    let text = text.trim_start_matches('\u{feff}');
    let markers: Vec<_> = marker_regex().captures_iter(text).collect();

    let head_end = markers
        .first()
        .and_then(|caps| caps.get(0))
        .map_or(text.len(), |m| m.start());

    let mut parts = parse_head(&text[..head_end]);

    for (idx, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        parts.documents.push(DocumentBlock::new(
            name.as_str().trim(),
            text[whole.end()..end].trim(),
        ));
    }

    parts
}

fn parse_head(head: &str) -> MarkdownParts {
    let Some(marker) = content_marker_regex().find(head) else {
        return parse_title_and_description(head);
    };

    let mut parts = parse_title_and_description(&head[..marker.start()]);
    let content = head[marker.end()..].trim();
    parts.content = match (parts.content.is_empty(), content.is_empty()) {
        (_, true) => parts.content,
        (true, false) => content.to_string(),
        (false, false) => format!("{}\n\n{}", parts.content, content),
    };
    parts
}

fn parse_title_and_description(head: &str) -> MarkdownParts {
    let mut parts = MarkdownParts::default();
    let mut rest = head.trim_start();

    if let Some(heading) = rest.strip_prefix("# ") {
        let (line, after) = heading.split_once('\n').unwrap_or((heading, ""));
        parts.title = line.trim().to_string();
        rest = after.trim_start();
    }

    if rest.starts_with('>') {
        let mut quoted = Vec::new();
        let mut consumed = 0;
        for line in rest.split_inclusive('\n') {
            let Some(stripped) = line.trim_end().strip_prefix('>') else {
                break;
            };
            quoted.push(stripped.strip_prefix(' ').unwrap_or(stripped).to_string());
            consumed += line.len();
        }
        parts.description = quoted.join("\n").trim().to_string();
        rest = rest[consumed..].trim_start();
    }

    parts.content = rest.trim_end().to_string();
    parts
}

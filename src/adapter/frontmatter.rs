//! YAML frontmatter for markdown-based native files

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A markdown file split into its frontmatter and body
#[derive(Debug, PartialEq, Eq)]
pub struct FrontMatterSplit<'a> {
    /// Raw YAML between the delimiters, if the file has frontmatter
    pub yaml: Option<&'a str>,
    pub body: &'a str,
}

/// Splits `content` into frontmatter and body. Files without a leading
/// `---` have no frontmatter; an opening delimiter without a closing one is
/// an error.
pub fn split(content: &str) -> Result<FrontMatterSplit<'_>, String> {
    let stripped = content.trim_start_matches('\u{feff}');
    let Some(rest) = stripped.strip_prefix("---") else {
        return Ok(FrontMatterSplit {
            yaml: None,
            body: stripped,
        });
    };

    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .ok_or_else(|| "missing newline after frontmatter start".to_string())?;

    // empty frontmatter: the closing delimiter follows immediately
    if let Some(after) = rest.strip_prefix("---") {
        let body = after.strip_prefix('\n').unwrap_or(after);
        return Ok(FrontMatterSplit {
            yaml: Some(""),
            body,
        });
    }

    let idx = rest
        .find("\n---")
        .ok_or_else(|| "missing closing frontmatter delimiter (---)".to_string())?;
    let yaml = rest[..idx].trim_end();
    let after = &rest[idx + 4..];
    let body = after
        .strip_prefix('\n')
        .or_else(|| after.strip_prefix("\r\n"))
        .unwrap_or(after);

    Ok(FrontMatterSplit {
        yaml: Some(yaml),
        body,
    })
}

/// Parses frontmatter into `T`; absent or empty frontmatter yields `T::default()`
pub fn parse<T: DeserializeOwned + Default>(content: &str) -> Result<(T, &str), String> {
    let split = split(content)?;
    let value = match split.yaml {
        Some(yaml) if !yaml.trim().is_empty() => {
            serde_yaml::from_str(yaml).map_err(|e| format!("invalid frontmatter: {}", e))?
        }
        _ => T::default(),
    };
    Ok((value, split.body))
}

/// Renders a frontmatter block followed by `body`. Frontmatter that
/// serializes to an empty mapping is omitted.
pub fn render<T: Serialize>(frontmatter: &T, body: &str) -> Result<String, serde_yaml::Error> {
    let yaml = serde_yaml::to_string(frontmatter)?;

    let mut out = String::new();
    if yaml.trim() != "{}" {
        out.push_str("---\n");
        out.push_str(&yaml);
        if !yaml.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("---\n\n");
    }
    out.push_str(body.trim());
    out.push('\n');
    Ok(out)
}

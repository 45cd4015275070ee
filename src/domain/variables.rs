//! Variable engine
//!
//! Forward substitution replaces `{{NAME}}` placeholders with bound values.
//! Restoration is the inverse used during sync: literal values found in
//! editor-produced text are turned back into placeholders.
//!
//! Bindings come from four layers, highest precedence last:
//!
//! | Origin | Source |
//! |--------|--------|
//! | `builtin` | computed (date, title, ...) |
//! | `document` | the document's `variables` table |
//! | `local-file` | `.promptsync/variables.local.yaml` |
//! | `override` | caller supplied (`--var NAME=VALUE`) |

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::document::CanonicalDocument;

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("Invalid regex")
    })
}

/// Returns true if `name` can appear inside a placeholder token
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The canonical placeholder token for a variable name
pub fn placeholder(name: &str) -> String {
    format!("{{{{{}}}}}", name)
}

/// Names referenced by placeholders in `text`, in order of first appearance
pub fn referenced_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in placeholder_regex().captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Ordered mapping of variable name to default value
///
/// Keys are unique and case-sensitive. Declaration order is kept because
/// restoration uses it to break ties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableTable(Vec<(String, String)>);

impl VariableTable {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets a value, keeping the original position of an existing key
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.0.push((name, value));
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses `NAME=VALUE` pairs (as given on the command line)
    pub fn from_assignments<I, S>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("Expected NAME=VALUE, got '{}'", pair))?;
            let name = name.trim();
            if !is_valid_name(name) {
                return Err(format!("Invalid variable name: '{}'", name));
            }
            table.insert(name, value);
        }
        Ok(table)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

impl Serialize for VariableTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// YAML lets authors write unquoted numbers and booleans as values
#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<ScalarValue> for String {
    fn from(value: ScalarValue) -> Self {
        match value {
            ScalarValue::Str(s) => s,
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Bool(b) => b.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for VariableTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = VariableTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of variable names to values")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(VariableTable::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut table = VariableTable::new();
                while let Some((key, value)) = access.next_entry::<String, ScalarValue>()? {
                    table.insert(key, String::from(value));
                }
                Ok(table)
            }
        }

        deserializer.deserialize_any(TableVisitor)
    }
}

/// Where a binding came from; later variants win
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariableOrigin {
    Builtin,
    Document,
    LocalFile,
    Override,
}

impl fmt::Display for VariableOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableOrigin::Builtin => write!(f, "builtin"),
            VariableOrigin::Document => write!(f, "document"),
            VariableOrigin::LocalFile => write!(f, "local-file"),
            VariableOrigin::Override => write!(f, "override"),
        }
    }
}

/// A resolved `(name, value, origin)` triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableBinding {
    pub name: String,
    pub value: String,
    pub origin: VariableOrigin,
}

/// Variable layers supplied by the caller on top of the document's own table
#[derive(Debug, Clone, Default)]
pub struct VariableLayers {
    pub local_file: VariableTable,
    pub overrides: VariableTable,
}

impl VariableLayers {
    pub fn new(local_file: VariableTable, overrides: VariableTable) -> Self {
        Self {
            local_file,
            overrides,
        }
    }

    pub fn overrides(overrides: VariableTable) -> Self {
        Self {
            local_file: VariableTable::new(),
            overrides,
        }
    }
}

/// Computed variables available to every document
pub fn builtin_variables(doc: &CanonicalDocument, now: DateTime<Utc>) -> VariableTable {
    let mut table = VariableTable::new();
    table.insert("CURRENT_DATE", now.format("%Y-%m-%d").to_string());
    table.insert("CURRENT_DATETIME", now.to_rfc3339());
    table.insert("CURRENT_YEAR", now.format("%Y").to_string());
    if !doc.metadata.title.is_empty() {
        table.insert("PROMPT_TITLE", doc.metadata.title.clone());
    }
    table.insert("PROMPT_VERSION", doc.metadata.version.clone());
    table
}

/// A resolved set of bindings, one per name
///
/// Recomputed for every generate/sync call and never persisted with the
/// document.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<VariableBinding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves all four layers for a document
    pub fn resolve(doc: &CanonicalDocument, layers: &VariableLayers, now: DateTime<Utc>) -> Self {
        let mut bindings = Self::new();
        bindings.bind_table(&builtin_variables(doc, now), VariableOrigin::Builtin);
        bindings.bind_table(&doc.variables, VariableOrigin::Document);
        bindings.bind_table(&layers.local_file, VariableOrigin::LocalFile);
        bindings.bind_table(&layers.overrides, VariableOrigin::Override);
        bindings
    }

    /// Bindings taken from a single table
    pub fn from_table(table: &VariableTable, origin: VariableOrigin) -> Self {
        let mut bindings = Self::new();
        bindings.bind_table(table, origin);
        bindings
    }

    /// Binds a name. A binding from a lower-precedence origin never replaces
    /// one from a higher origin; within the same origin the last write wins.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>, origin: VariableOrigin) {
        let name = name.into();
        match self.entries.iter_mut().find(|b| b.name == name) {
            Some(existing) => {
                if origin >= existing.origin {
                    existing.value = value.into();
                    existing.origin = origin;
                }
            }
            None => self.entries.push(VariableBinding {
                name,
                value: value.into(),
                origin,
            }),
        }
    }

    pub fn bind_table(&mut self, table: &VariableTable, origin: VariableOrigin) {
        for (name, value) in table.iter() {
            self.bind(name, value, origin);
        }
    }

    pub fn get(&self, name: &str) -> Option<&VariableBinding> {
        self.entries.iter().find(|b| b.name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|b| b.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariableBinding> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name → value map for the generation record
    ///
    /// Only builtin and document values are included; local-file and
    /// override values stay out of anything written to the project.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter(|b| b.origin <= VariableOrigin::Document)
            .map(|b| (b.name.clone(), b.value.clone()))
            .collect()
    }

    /// Replaces every bound placeholder; unbound placeholders are left as-is
    pub fn substitute(&self, text: &str) -> String {
        substitute(text, self)
    }

    /// Turns literal bound values back into placeholders
    pub fn restore(&self, text: &str) -> String {
        restore(text, self)
    }
}

/// Forward substitution. Partial substitution is safe to chain.
pub fn substitute(text: &str, bindings: &Bindings) -> String {
    placeholder_regex()
        .replace_all(text, |caps: &regex::Captures<'_>| match bindings.value(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[derive(Debug)]
enum Segment {
    Literal(String),
    Token(String),
}

impl Segment {
    fn text(&self) -> &str {
        match self {
            Segment::Literal(s) | Segment::Token(s) => s,
        }
    }
}

fn split_tokens(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;
    for m in placeholder_regex().find_iter(text) {
        if m.start() > last {
            segments.push(Segment::Literal(text[last..m.start()].to_string()));
        }
        segments.push(Segment::Token(m.as_str().to_string()));
        last = m.end();
    }
    if last < text.len() {
        segments.push(Segment::Literal(text[last..].to_string()));
    }
    segments
}

/// Bindings eligible for restoration, longest value first, then declaration order
fn restoration_candidates(bindings: &Bindings) -> Vec<&VariableBinding> {
    let mut candidates: Vec<_> = bindings
        .iter()
        .filter(|b| is_valid_name(&b.name))
        .filter(|b| !b.value.trim().is_empty())
        .filter(|b| !placeholder_regex().is_match(&b.value))
        .collect();
    // stable sort keeps declaration order among equal lengths
    candidates.sort_by(|a, b| b.value.len().cmp(&a.value.len()));
    candidates
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Inverse substitution.
///
/// Existing placeholders are never touched and each replaced occurrence
/// becomes a protected token, so `restore(restore(x)) == restore(x)`.
pub fn restore(text: &str, bindings: &Bindings) -> String {
    let mut segments = split_tokens(text);

    for binding in restoration_candidates(bindings) {
        let value = binding.value.as_str();
        let token = placeholder(&binding.name);
        let check_start = value.chars().next().is_some_and(is_word_char);
        let check_end = value.chars().last().is_some_and(is_word_char);

        let mut next = Vec::with_capacity(segments.len());
        let mut prev_char: Option<char> = None;

        for (idx, segment) in segments.iter().enumerate() {
            let literal = match segment {
                Segment::Token(t) => {
                    prev_char = t.chars().last();
                    next.push(Segment::Token(t.clone()));
                    continue;
                }
                Segment::Literal(s) => s,
            };

            let following = segments.get(idx + 1).and_then(|s| s.text().chars().next());
            let mut rest_start = 0;
            let mut search_from = 0;

            while let Some(found) = literal[search_from..].find(value) {
                let start = search_from + found;
                let end = start + value.len();

                let before = if start == 0 {
                    prev_char
                } else {
                    literal[..start].chars().last()
                };
                let after = if end == literal.len() {
                    following
                } else {
                    literal[end..].chars().next()
                };

                let blocked = (check_start && before.is_some_and(is_word_char))
                    || (check_end && after.is_some_and(is_word_char));

                if blocked {
                    // advance by one character to look for later occurrences
                    let step = literal[start..].chars().next().map_or(1, char::len_utf8);
                    search_from = start + step;
                    continue;
                }

                if start > rest_start {
                    next.push(Segment::Literal(literal[rest_start..start].to_string()));
                }
                next.push(Segment::Token(token.clone()));
                rest_start = end;
                search_from = end;
            }

            if rest_start < literal.len() {
                next.push(Segment::Literal(literal[rest_start..].to_string()));
            }
            prev_char = literal.chars().last();
        }

        segments = next;
    }

    segments.iter().map(Segment::text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn table(pairs: &[(&str, &str)]) -> VariableTable {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn substitute_replaces_bound_placeholders() {
        let bindings = Bindings::from_table(&table(&[("NAME", "Foo")]), VariableOrigin::Document);
        assert_eq!(bindings.substitute("Hello {{NAME}}!"), "Hello Foo!");
        assert_eq!(bindings.substitute("Hello {{ NAME }}!"), "Hello Foo!");
    }

    #[test]
    fn substitute_leaves_unresolved_placeholders() {
        let bindings = Bindings::from_table(&table(&[("NAME", "Foo")]), VariableOrigin::Document);
        assert_eq!(bindings.substitute("{{NAME}} and {{OTHER}}"), "Foo and {{OTHER}}");
        assert_eq!(bindings.substitute("{{not valid}}"), "{{not valid}}");
    }

    #[test]
    fn precedence_override_wins() {
        let mut doc = CanonicalDocument::new("Demo", "v{{VERSION}}");
        doc.variables.insert("VERSION", "1.0.0");
        let layers = VariableLayers::overrides(table(&[("VERSION", "2.0.0")]));

        let bindings = Bindings::resolve(&doc, &layers, fixed_now());

        assert_eq!(bindings.substitute(&doc.content), "v2.0.0");
        assert_eq!(bindings.get("VERSION").unwrap().origin, VariableOrigin::Override);
    }

    #[test]
    fn precedence_across_all_origins() {
        let mut bindings = Bindings::new();
        bindings.bind("X", "override", VariableOrigin::Override);
        bindings.bind("X", "builtin", VariableOrigin::Builtin);
        bindings.bind("X", "document", VariableOrigin::Document);
        bindings.bind("X", "local", VariableOrigin::LocalFile);
        assert_eq!(bindings.value("X"), Some("override"));

        let mut doc = CanonicalDocument::new("Demo", "");
        doc.variables.insert("CURRENT_YEAR", "doc");
        let layers = VariableLayers::new(table(&[("CURRENT_YEAR", "local")]), VariableTable::new());
        let resolved = Bindings::resolve(&doc, &layers, fixed_now());
        assert_eq!(resolved.value("CURRENT_YEAR"), Some("local"));
        assert_eq!(resolved.get("CURRENT_YEAR").unwrap().origin, VariableOrigin::LocalFile);
    }

    #[test]
    fn snapshot_leaves_out_local_and_override_values() {
        let mut doc = CanonicalDocument::new("Demo", "");
        doc.variables.insert("SERVICE", "billing");
        doc.variables.insert("REGION", "eu-west-1");
        let layers = VariableLayers::new(
            table(&[("API_TOKEN", "s3cr3t-XYZ")]),
            table(&[("REGION", "us-east-1")]),
        );

        let snapshot = Bindings::resolve(&doc, &layers, fixed_now()).snapshot();

        assert_eq!(snapshot.get("SERVICE").map(String::as_str), Some("billing"));
        assert_eq!(snapshot.get("CURRENT_YEAR").map(String::as_str), Some("2024"));
        assert!(!snapshot.contains_key("API_TOKEN"));
        assert!(!snapshot.contains_key("REGION"));
        assert!(!snapshot.values().any(|v| v == "s3cr3t-XYZ" || v == "us-east-1"));
    }

    #[test]
    fn same_origin_rebinding_is_last_writer_wins() {
        let mut bindings = Bindings::new();
        bindings.bind("A", "1", VariableOrigin::Document);
        bindings.bind("A", "2", VariableOrigin::Document);
        assert_eq!(bindings.value("A"), Some("2"));
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn builtins_use_injected_clock() {
        let doc = CanonicalDocument::new("Demo", "");
        let bindings = Bindings::resolve(&doc, &VariableLayers::default(), fixed_now());
        assert_eq!(bindings.value("CURRENT_DATE"), Some("2024-03-09"));
        assert_eq!(bindings.value("CURRENT_YEAR"), Some("2024"));
        assert_eq!(bindings.value("PROMPT_TITLE"), Some("Demo"));
    }

    #[test]
    fn restore_basic() {
        let bindings = Bindings::from_table(
            &table(&[("AUTHOR_EMAIL", "dev@example.com")]),
            VariableOrigin::Document,
        );
        assert_eq!(
            bindings.restore("Contact dev@example.com"),
            "Contact {{AUTHOR_EMAIL}}"
        );
    }

    #[test]
    fn restore_prefers_longest_value() {
        let bindings = Bindings::from_table(
            &table(&[("ORG", "Acme"), ("PRODUCT", "Acme Cloud")]),
            VariableOrigin::Document,
        );
        assert_eq!(
            bindings.restore("Acme Cloud is built by Acme"),
            "{{PRODUCT}} is built by {{ORG}}"
        );
    }

    #[test]
    fn restore_ties_use_declaration_order() {
        let bindings = Bindings::from_table(
            &table(&[("FIRST", "same"), ("SECOND", "same")]),
            VariableOrigin::Document,
        );
        assert_eq!(bindings.restore("the same thing"), "the {{FIRST}} thing");
    }

    #[test]
    fn restore_respects_word_boundaries() {
        let bindings = Bindings::from_table(&table(&[("VERSION", "1.0")]), VariableOrigin::Document);
        assert_eq!(bindings.restore("v11.05 and 1.0"), "v11.05 and {{VERSION}}");
    }

    #[test]
    fn restore_keeps_existing_placeholders() {
        let bindings = Bindings::from_table(&table(&[("NAME", "NAME")]), VariableOrigin::Document);
        assert_eq!(bindings.restore("{{NAME}} is NAME"), "{{NAME}} is {{NAME}}");
    }

    #[test]
    fn restore_skips_blank_values() {
        let bindings = Bindings::from_table(&table(&[("EMPTY", ""), ("SPACE", " ")]), VariableOrigin::Document);
        assert_eq!(bindings.restore("a b"), "a b");
    }

    #[test]
    fn restore_is_idempotent_on_scenario() {
        let bindings = Bindings::from_table(&table(&[("NAME", "Foo")]), VariableOrigin::Document);
        let once = bindings.restore("Hello Foo, welcome");
        assert_eq!(once, "Hello {{NAME}}, welcome");
        assert_eq!(bindings.restore(&once), once);
    }

    #[test]
    fn table_from_assignments() {
        let parsed = VariableTable::from_assignments(["A=1", "B=x=y"]).unwrap();
        assert_eq!(parsed.get("A"), Some("1"));
        assert_eq!(parsed.get("B"), Some("x=y"));
        assert!(VariableTable::from_assignments(["nope"]).is_err());
        assert!(VariableTable::from_assignments(["1BAD=x"]).is_err());
    }

    #[test]
    fn table_insert_keeps_position() {
        let mut t = table(&[("A", "1"), ("B", "2")]);
        assert_eq!(t.insert("A", "3"), Some("1".to_string()));
        let names: Vec<_> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn table_yaml_accepts_scalars() {
        let t: VariableTable = serde_yaml::from_str("PORT: 8080\nDEBUG: true\nNAME: app\n").unwrap();
        assert_eq!(t.get("PORT"), Some("8080"));
        assert_eq!(t.get("DEBUG"), Some("true"));
        assert_eq!(t.get("NAME"), Some("app"));
    }

    #[test]
    fn referenced_names_in_order() {
        assert_eq!(
            referenced_names("{{B}} {{A}} {{B}}"),
            vec!["B".to_string(), "A".to_string()]
        );
    }

    proptest! {
        #[test]
        fn restore_is_idempotent(
            text in "[a-z@. ]{0,60}",
            values in proptest::collection::vec("[a-z@.]{2,8}", 1..4),
        ) {
            let bindings: Bindings = {
                let mut b = Bindings::new();
                for (i, value) in values.iter().enumerate() {
                    b.bind(format!("VAR_{}", i), value.clone(), VariableOrigin::Document);
                }
                b
            };
            let once = restore(&text, &bindings);
            let twice = restore(&once, &bindings);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn substitute_undoes_restore(
            words in proptest::collection::vec(("[a-z]{1,6}", any::<bool>()), 0..12),
            value in "[A-Z][a-z]{3,8}",
        ) {
            let vars: VariableTable = std::iter::once(("NAME", value.clone())).collect();
            let bindings = Bindings::from_table(&vars, VariableOrigin::Document);
            let text = words
                .iter()
                .map(|(word, use_value)| if *use_value { value.clone() } else { word.clone() })
                .collect::<Vec<_>>()
                .join(" ");

            let restored = restore(&text, &bindings);
            prop_assert_eq!(restored.contains(&value), false);
            prop_assert_eq!(substitute(&restored, &bindings), text);
        }
    }
}

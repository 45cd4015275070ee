//! Continue configuration (`.continue/config.json`)
//!
//! ```json
//! {
//!   "name": "<title>",
//!   "systemMessage": "<content>",
//!   "rules": [{ "name": "<document>", "rule": "<content>", "globs": ["..."] }],
//!   "customCommands": [{ "name": "...", "description": "...", "prompt": "..." }],
//!   "mcpServers": [{ "name": "...", "command": "...", "args": [], "env": {} }]
//! }
//! ```
//!
//! Rules may also be plain strings; those decode to documents named
//! `rule-{n}`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Bindings, CanonicalDocument, Command, DocumentBlock, McpServer};

use super::{read_native, AdapterCapabilitySet, DecodeError, EncodeError, FileWrite, FormatAdapter};

const NAME: &str = "continue";
const CONFIG_FILE: &str = ".continue/config.json";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContinueConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    system_message: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    rules: Vec<ContinueRule>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    custom_commands: Vec<ContinueCommand>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    mcp_servers: Vec<ContinueMcpServer>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ContinueRule {
    Text(String),
    Detailed {
        name: String,
        rule: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        globs: Option<Globs>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Globs {
    One(String),
    Many(Vec<String>),
}

impl Globs {
    fn into_vec(self) -> Vec<String> {
        match self {
            Globs::One(glob) => vec![glob],
            Globs::Many(globs) => globs,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ContinueCommand {
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default)]
    prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContinueMcpServer {
    name: String,
    command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueAdapter;

impl ContinueAdapter {
    fn to_config(doc: &CanonicalDocument, bindings: &Bindings) -> ContinueConfig {
        let rules = doc
            .documents
            .iter()
            .map(|block| ContinueRule::Detailed {
                name: bindings.substitute(&block.name),
                rule: bindings.substitute(&block.content),
                globs: (!block.file_globs.is_empty()).then(|| Globs::Many(block.file_globs.clone())),
            })
            .collect();

        let custom_commands = doc
            .plugins
            .commands
            .iter()
            .map(|command| ContinueCommand {
                name: command.name.clone(),
                description: command.description.as_deref().map(|d| bindings.substitute(d)),
                prompt: bindings.substitute(&command.content),
            })
            .collect();

        let mcp_servers = doc
            .plugins
            .mcp_servers
            .iter()
            .map(|server| ContinueMcpServer {
                name: server.name.clone(),
                command: bindings.substitute(&server.command),
                args: server.args.iter().map(|a| bindings.substitute(a)).collect(),
                env: server
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), bindings.substitute(v)))
                    .collect(),
            })
            .collect();

        ContinueConfig {
            name: bindings.substitute(&doc.metadata.title),
            system_message: bindings.substitute(&doc.content),
            rules,
            custom_commands,
            mcp_servers,
        }
    }

    fn from_config(config: ContinueConfig) -> CanonicalDocument {
        let mut doc = CanonicalDocument::new(config.name, config.system_message);

        for (idx, rule) in config.rules.into_iter().enumerate() {
            let block = match rule {
                ContinueRule::Text(text) => DocumentBlock::new(format!("rule-{}", idx + 1), text),
                ContinueRule::Detailed { name, rule, globs } => {
                    let mut block = DocumentBlock::new(name, rule);
                    block.file_globs = globs.map(Globs::into_vec).unwrap_or_default();
                    block
                }
            };
            doc.documents.push(block);
        }

        doc.plugins.commands = config
            .custom_commands
            .into_iter()
            .map(|c| {
                let mut command = Command::new(c.name, c.prompt);
                command.description = c.description;
                command
            })
            .collect();

        doc.plugins.mcp_servers = config
            .mcp_servers
            .into_iter()
            .map(|s| {
                let mut server = McpServer::new(s.name, s.command);
                server.args = s.args;
                server.env = s.env;
                server
            })
            .collect();

        doc
    }
}

impl FormatAdapter for ContinueAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilitySet {
        AdapterCapabilitySet::bidirectional()
    }

    fn locations(&self) -> Vec<String> {
        vec![CONFIG_FILE.to_string()]
    }

    fn encode(&self, doc: &CanonicalDocument, bindings: &Bindings) -> Result<Vec<FileWrite>, EncodeError> {
        let config = Self::to_config(doc, bindings);
        let mut json = serde_json::to_string_pretty(&config).map_err(|e| EncodeError::render(NAME, e))?;
        json.push('\n');
        Ok(vec![FileWrite::new(CONFIG_FILE, json)])
    }

    fn decode(&self, source_dir: &Path) -> Result<CanonicalDocument, DecodeError> {
        let path = source_dir.join(CONFIG_FILE);
        let text = read_native(NAME, &path)?.ok_or_else(|| DecodeError::NotFound {
            adapter: NAME.to_string(),
            path: path.clone(),
        })?;

        let config: ContinueConfig =
            serde_json::from_str(&text).map_err(|e| DecodeError::malformed(NAME, &path, e))?;

        tracing::debug!(adapter = NAME, rules = config.rules.len(), "decoded");
        Ok(Self::from_config(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{merge, Agent, VariableOrigin};
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> CanonicalDocument {
        let mut doc = CanonicalDocument::new("Acme", "You help with {{PRODUCT}}.");
        doc.variables.insert("PRODUCT", "Acme Cloud");

        let mut block = DocumentBlock::new("frontend", "Use TypeScript.");
        block.file_globs = vec!["web/**/*.ts".to_string()];
        doc.documents.push(block);

        let mut command = Command::new("test", "Write tests for {{PRODUCT}}");
        command.description = Some("Generate tests".to_string());
        doc.plugins.commands.push(command);

        let mut server = McpServer::new("github", "npx");
        server.args = vec!["-y".to_string(), "@modelcontextprotocol/server-github".to_string()];
        server.env.insert("GITHUB_TOKEN".to_string(), "${GITHUB_TOKEN}".to_string());
        doc.plugins.mcp_servers.push(server);
        doc
    }

    fn write_files(dir: &Path, files: &[FileWrite]) {
        for file in files {
            let path = dir.join(&file.path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, &file.contents).unwrap();
        }
    }

    fn bindings(doc: &CanonicalDocument) -> Bindings {
        Bindings::from_table(&doc.variables, VariableOrigin::Document)
    }

    #[test]
    fn encode_is_json() {
        let doc = sample();
        let files = ContinueAdapter.encode(&doc, &bindings(&doc)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&files[0].contents).unwrap();

        assert_eq!(json["name"], "Acme");
        assert_eq!(json["systemMessage"], "You help with Acme Cloud.");
        assert_eq!(json["rules"][0]["globs"][0], "web/**/*.ts");
        assert_eq!(json["customCommands"][0]["prompt"], "Write tests for Acme Cloud");
        assert_eq!(json["mcpServers"][0]["env"]["GITHUB_TOKEN"], "${GITHUB_TOKEN}");
    }

    #[test]
    fn round_trip_is_identity() {
        let doc = sample();
        let dir = TempDir::new().unwrap();
        write_files(dir.path(), &ContinueAdapter.encode(&doc, &bindings(&doc)).unwrap());

        let decoded = ContinueAdapter.decode(dir.path()).unwrap();
        let outcome = merge(Some(&doc), decoded, ContinueAdapter.merge_policy());

        assert_eq!(outcome.document, doc);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn lossy_fields_are_not_represented() {
        let mut doc = sample();
        doc.metadata.description = "About".to_string();
        doc.metadata.author = Some("dev".to_string());
        doc.metadata.tags = vec!["web".to_string()];
        doc.documents[0].description = Some("Frontend".to_string());
        doc.plugins.agents.push(Agent::new("reviewer", "Review"));
        doc.plugins.commands[0].argument_hint = Some("<file>".to_string());
        doc.plugins.commands[0].requires_approval = Some(true);
        doc.plugins.mcp_servers[0].description = Some("GitHub access".to_string());

        let dir = TempDir::new().unwrap();
        write_files(dir.path(), &ContinueAdapter.encode(&doc, &bindings(&doc)).unwrap());
        let decoded = ContinueAdapter.decode(dir.path()).unwrap();

        assert!(decoded.metadata.description.is_empty());
        assert!(decoded.metadata.author.is_none());
        assert!(decoded.metadata.tags.is_empty());
        assert!(decoded.documents[0].description.is_none());
        assert!(decoded.plugins.agents.is_empty());
        assert!(decoded.plugins.hooks.is_empty());
        assert!(decoded.plugins.commands[0].argument_hint.is_none());
        assert!(!decoded.plugins.commands[0].has_workflow_fields());
        assert!(decoded.plugins.mcp_servers[0].description.is_none());

        // the merge carries them over from the existing entries
        let merged = merge(Some(&doc), decoded, ContinueAdapter.merge_policy()).document;
        assert_eq!(merged.plugins.commands, doc.plugins.commands);
        assert_eq!(merged.plugins.mcp_servers, doc.plugins.mcp_servers);
    }

    #[test]
    fn string_rules_get_generated_names() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".continue")).unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"systemMessage": "Be brief", "rules": ["Use tabs", {"name": "docs", "rule": "Document APIs", "globs": "src/*.rs"}], "models": []}"#,
        )
        .unwrap();

        let doc = ContinueAdapter.decode(dir.path()).unwrap();
        assert_eq!(doc.content, "Be brief");
        assert_eq!(doc.documents[0], DocumentBlock::new("rule-1", "Use tabs"));
        assert_eq!(doc.documents[1].file_globs, vec!["src/*.rs"]);
    }

    #[test]
    fn invalid_json_is_malformed() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".continue")).unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();

        let err = ContinueAdapter.decode(dir.path()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn missing_config_is_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(ContinueAdapter.decode(dir.path()).unwrap_err().is_not_found());
    }
}

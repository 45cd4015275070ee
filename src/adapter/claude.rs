//! Claude Code project files
//!
//! | Part | File |
//! |------|------|
//! | title, description, content, documents | `CLAUDE.md` |
//! | commands | `.claude/commands/{slug}.md` (frontmatter: `name` when it differs from the slug, `description`, `argument-hint`) |
//! | agents | `.claude/agents/{name}.md` (frontmatter: `name`, `description`, `tools`, `model`) |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{Agent, Bindings, CanonicalDocument, Command};

use super::markdown_file::render_substituted;
use super::{
    file_stem, frontmatter, list_files, read_native, sections, unique_slugs, AdapterCapabilitySet,
    DecodeError, EncodeError, FileWrite, FormatAdapter,
};

const NAME: &str = "claude";
const MEMORY_FILE: &str = "CLAUDE.md";
const COMMANDS_DIR: &str = ".claude/commands";
const AGENTS_DIR: &str = ".claude/agents";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CommandFrontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default, rename = "argument-hint", skip_serializing_if = "Option::is_none")]
    argument_hint: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AgentFrontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    /// Comma-separated tool names
    #[serde(default, deserialize_with = "tools_from_any", skip_serializing_if = "Option::is_none")]
    tools: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

/// Tools may be written as `Read, Grep` or as a YAML list
fn tools_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => None,
        Some(OneOrMany::One(s)) => Some(s),
        Some(OneOrMany::Many(list)) => Some(list.join(", ")),
    })
}

fn split_tools(tools: Option<String>) -> Vec<String> {
    tools
        .unwrap_or_default()
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn substitute_opt(bindings: &Bindings, text: &Option<String>) -> Option<String> {
    text.as_deref()
        .map(|t| bindings.substitute(t))
        .filter(|t| !t.trim().is_empty())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeAdapter;

impl ClaudeAdapter {
    fn encode_command(&self, command: &Command, stem: &str, bindings: &Bindings) -> Result<FileWrite, EncodeError> {
        let fm = CommandFrontmatter {
            name: (command.name != stem).then(|| command.name.clone()),
            description: substitute_opt(bindings, &command.description),
            argument_hint: substitute_opt(bindings, &command.argument_hint),
        };
        let text = frontmatter::render(&fm, &bindings.substitute(&command.content))
            .map_err(|e| EncodeError::render(NAME, e))?;
        Ok(FileWrite::new(
            Path::new(COMMANDS_DIR).join(format!("{}.md", stem)),
            text,
        ))
    }

    fn encode_agent(&self, agent: &Agent, stem: &str, bindings: &Bindings) -> Result<FileWrite, EncodeError> {
        let fm = AgentFrontmatter {
            name: Some(agent.name.clone()),
            description: substitute_opt(bindings, &agent.description),
            tools: (!agent.tools.is_empty()).then(|| agent.tools.join(", ")),
            model: agent.model.clone(),
        };
        let text = frontmatter::render(&fm, &bindings.substitute(&agent.content))
            .map_err(|e| EncodeError::render(NAME, e))?;
        Ok(FileWrite::new(
            Path::new(AGENTS_DIR).join(format!("{}.md", stem)),
            text,
        ))
    }

    fn decode_commands(&self, paths: Vec<PathBuf>) -> Result<Vec<Command>, DecodeError> {
        let mut commands = Vec::new();
        for path in paths {
            let Some(text) = read_native(NAME, &path)? else {
                continue;
            };
            let (fm, body): (CommandFrontmatter, _) =
                frontmatter::parse(&text).map_err(|reason| DecodeError::malformed(NAME, &path, reason))?;

            let name = fm
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| file_stem(&path));
            let mut command = Command::new(name, body.trim());
            command.description = fm.description;
            command.argument_hint = fm.argument_hint;
            commands.push(command);
        }
        Ok(commands)
    }

    fn decode_agents(&self, paths: Vec<PathBuf>) -> Result<Vec<Agent>, DecodeError> {
        let mut agents = Vec::new();
        for path in paths {
            let Some(text) = read_native(NAME, &path)? else {
                continue;
            };
            let (fm, body): (AgentFrontmatter, _) =
                frontmatter::parse(&text).map_err(|reason| DecodeError::malformed(NAME, &path, reason))?;

            let name = fm
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| file_stem(&path));
            let mut agent = Agent::new(name, body.trim());
            agent.description = fm.description;
            agent.tools = split_tools(fm.tools);
            agent.model = fm.model;
            agents.push(agent);
        }
        Ok(agents)
    }
}

impl FormatAdapter for ClaudeAdapter {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilitySet {
        AdapterCapabilitySet::bidirectional()
    }

    fn locations(&self) -> Vec<String> {
        vec![
            MEMORY_FILE.to_string(),
            format!("{}/*.md", COMMANDS_DIR),
            format!("{}/*.md", AGENTS_DIR),
        ]
    }

    fn encode(&self, doc: &CanonicalDocument, bindings: &Bindings) -> Result<Vec<FileWrite>, EncodeError> {
        let mut files = vec![FileWrite::new(MEMORY_FILE, render_substituted(doc, bindings))];

        let plugins = &doc.plugins;
        let command_stems = unique_slugs(plugins.commands.iter().map(|c| c.name.as_str()), &[]);
        for (command, stem) in plugins.commands.iter().zip(command_stems) {
            files.push(self.encode_command(command, &stem, bindings)?);
        }

        let agent_stems = unique_slugs(plugins.agents.iter().map(|a| a.name.as_str()), &[]);
        for (agent, stem) in plugins.agents.iter().zip(agent_stems) {
            files.push(self.encode_agent(agent, &stem, bindings)?);
        }

        if !plugins.mcp_servers.is_empty() || !plugins.hooks.is_empty() {
            tracing::debug!(
                adapter = NAME,
                mcp_servers = plugins.mcp_servers.len(),
                hooks = plugins.hooks.len(),
                "entries without a native representation were skipped"
            );
        }

        Ok(files)
    }

    fn decode(&self, source_dir: &Path) -> Result<CanonicalDocument, DecodeError> {
        let memory_path = source_dir.join(MEMORY_FILE);
        let memory = read_native(NAME, &memory_path)?;
        let command_paths = list_files(NAME, &source_dir.join(COMMANDS_DIR), "md")?;
        let agent_paths = list_files(NAME, &source_dir.join(AGENTS_DIR), "md")?;

        if memory.is_none() && command_paths.is_empty() && agent_paths.is_empty() {
            return Err(DecodeError::NotFound {
                adapter: NAME.to_string(),
                path: memory_path,
            });
        }

        let mut doc = match memory {
            Some(text) => sections::parse(&text).into_document(),
            None => CanonicalDocument::empty(),
        };
        doc.plugins.commands = self.decode_commands(command_paths)?;
        doc.plugins.agents = self.decode_agents(agent_paths)?;

        tracing::debug!(
            adapter = NAME,
            commands = doc.plugins.commands.len(),
            agents = doc.plugins.agents.len(),
            "decoded"
        );
        Ok(doc)
    }
}

//! Plugin declarations carried by a canonical document
//!
//! Four independent lists: MCP servers, slash commands, sub-agents and hooks.
//! Each list is keyed by `name`; names are unique within a list.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Anything that lives in a name-keyed plugin list
pub trait Named {
    fn name(&self) -> &str;

    /// Called when a decoded entry replaces `existing`: copies over fields
    /// the decoded entry left unset because its native format cannot hold them
    fn keep_unrepresented(&mut self, _existing: &Self) {}
}

/// Which plugin list an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginKind {
    McpServers,
    Commands,
    Agents,
    Hooks,
}

impl PluginKind {
    /// Serialized field name for this list
    pub fn field_name(&self) -> &'static str {
        match self {
            PluginKind::McpServers => "mcpServers",
            PluginKind::Commands => "commands",
            PluginKind::Agents => "agents",
            PluginKind::Hooks => "hooks",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// An MCP server the assistant may launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServer {
    pub name: String,

    /// Executable to launch
    pub command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            description: None,
        }
    }
}

/// One step of a multi-step command workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandStep {
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

/// A reusable slash command
///
/// The workflow fields (`multi_step`, `tool_calls`, `requires_approval`,
/// `steps`) are only legal from schema 3.1 on. A command without them behaves
/// exactly like one with `multi_step: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Prompt body sent when the command runs
    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_hint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_step: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_approval: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<CommandStep>>,
}

impl Command {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            content: content.into(),
            argument_hint: None,
            multi_step: None,
            tool_calls: None,
            requires_approval: None,
            steps: None,
        }
    }

    pub fn is_multi_step(&self) -> bool {
        self.multi_step.unwrap_or(false)
    }

    /// Returns true if any schema 3.1 workflow field is set
    pub fn has_workflow_fields(&self) -> bool {
        self.multi_step.is_some()
            || self.tool_calls.is_some()
            || self.requires_approval.is_some()
            || self.steps.is_some()
    }

    /// Removes the workflow fields, returning true if anything was removed
    pub fn strip_workflow_fields(&mut self) -> bool {
        let had = self.has_workflow_fields();
        self.multi_step = None;
        self.tool_calls = None;
        self.requires_approval = None;
        self.steps = None;
        had
    }
}

/// A specialised sub-agent definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// System prompt for the agent
    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            content: content.into(),
            tools: Vec::new(),
            model: None,
        }
    }
}

/// A shell hook bound to an assistant lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    pub name: String,

    /// Lifecycle event (e.g. `PreToolUse`)
    pub event: String,

    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
}

impl Named for McpServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn keep_unrepresented(&mut self, existing: &Self) {
        if self.description.is_none() {
            self.description = existing.description.clone();
        }
    }
}

impl Named for Command {
    fn name(&self) -> &str {
        &self.name
    }

    fn keep_unrepresented(&mut self, existing: &Self) {
        if self.argument_hint.is_none() {
            self.argument_hint = existing.argument_hint.clone();
        }
        if !self.has_workflow_fields() {
            self.multi_step = existing.multi_step;
            self.tool_calls = existing.tool_calls.clone();
            self.requires_approval = existing.requires_approval;
            self.steps = existing.steps.clone();
        }
    }
}

impl Named for Agent {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Hook {
    fn name(&self) -> &str {
        &self.name
    }
}

/// The four plugin lists of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSet {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServer>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<Agent>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<Hook>,
}

impl PluginSet {
    pub fn is_empty(&self) -> bool {
        self.mcp_servers.is_empty()
            && self.commands.is_empty()
            && self.agents.is_empty()
            && self.hooks.is_empty()
    }

    /// Total number of entries across all lists
    pub fn len(&self) -> usize {
        self.mcp_servers.len() + self.commands.len() + self.agents.len() + self.hooks.len()
    }

    /// Drops later entries whose name repeats an earlier one in the same list.
    /// Returns the `(kind, name)` of every dropped entry.
    pub fn dedupe_names(&mut self) -> Vec<(PluginKind, String)> {
        let mut dropped = Vec::new();
        dedupe_list(&mut self.mcp_servers, PluginKind::McpServers, &mut dropped);
        dedupe_list(&mut self.commands, PluginKind::Commands, &mut dropped);
        dedupe_list(&mut self.agents, PluginKind::Agents, &mut dropped);
        dedupe_list(&mut self.hooks, PluginKind::Hooks, &mut dropped);
        dropped
    }
}

fn dedupe_list<T: Named>(list: &mut Vec<T>, kind: PluginKind, dropped: &mut Vec<(PluginKind, String)>) {
    let mut seen = HashSet::new();
    list.retain(|entry| {
        if seen.insert(entry.name().to_string()) {
            true
        } else {
            dropped.push((kind, entry.name().to_string()));
            false
        }
    });
}

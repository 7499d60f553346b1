//! Output formatting for CLI commands.
//!
//! Every listing renders as aligned text or pretty JSON.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{CommandError, Result};
use crate::registry::AgentDefinition;
use crate::service::{ConfigSnapshot, ConfigUpdateOutcome, InvocationResult};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name. Anything but `json` is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// One row of `tools` output.
#[derive(Debug, Clone, Serialize)]
pub struct ToolRow {
    /// Tool name.
    pub name: String,
    /// Group the tool is listed under.
    pub group: String,
    /// Tool description.
    pub description: String,
}

/// One row of `backends` output.
#[derive(Debug, Clone, Serialize)]
pub struct BackendRow {
    /// Backend name.
    pub name: String,
    /// Effective model.
    pub model: String,
    /// Effective service URL.
    pub base_url: String,
    /// Whether the backend authenticates with a key.
    pub requires_api_key: bool,
    /// Whether a key is set where one is needed.
    pub configured: bool,
    /// Whether this is the active backend.
    pub active: bool,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::OutputFormat(e.to_string()).into())
}

/// Formats an invocation result.
pub fn format_invocation(result: &InvocationResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(result),
        OutputFormat::Text => {
            let mut out = result.output.clone();
            if let Some(reflection) = result.metadata.get("reflection")
                && let Some(iterations) = reflection.get("iterations")
            {
                let _ = write!(
                    out,
                    "\n\n---\nAgent: {} | Backend: {} | Revisions: {iterations}",
                    result.agent_name, result.model_type
                );
            }
            Ok(out)
        }
    }
}

/// Formats the agent listing.
pub fn format_agents(agents: &[Arc<AgentDefinition>], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<&AgentDefinition> = agents.iter().map(AsRef::as_ref).collect();
            to_json(&rows)
        }
        OutputFormat::Text => {
            if agents.is_empty() {
                return Ok("No agents registered.".to_string());
            }
            let width = agents.iter().map(|a| a.name.len()).max().unwrap_or(0);
            let mut out = String::new();
            for agent in agents {
                let _ = writeln!(
                    out,
                    "{:<width$}  {}  {} [{}]",
                    agent.name,
                    agent.display_name,
                    agent.description,
                    agent.tool_groups.join(", ")
                );
            }
            Ok(out.trim_end().to_string())
        }
    }
}

/// Formats the tool listing.
pub fn format_tools(tools: &[ToolRow], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(tools),
        OutputFormat::Text => {
            if tools.is_empty() {
                return Ok("No tools registered.".to_string());
            }
            let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
            let mut out = String::new();
            let mut group = "";
            for tool in tools {
                if tool.group != group {
                    group = &tool.group;
                    let _ = writeln!(out, "[{group}]");
                }
                let _ = writeln!(out, "  {:<width$}  {}", tool.name, tool.description);
            }
            Ok(out.trim_end().to_string())
        }
    }
}

/// Formats the backend listing.
pub fn format_backends(backends: &[BackendRow], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(backends),
        OutputFormat::Text => {
            let mut out = String::new();
            for b in backends {
                let marker = if b.active { "*" } else { " " };
                let status = if b.configured { "ready" } else { "no API key" };
                let _ = writeln!(
                    out,
                    "{marker} {:<9} {:<32} {status}  {}",
                    b.name, b.model, b.base_url
                );
            }
            Ok(out.trim_end().to_string())
        }
    }
}

/// Formats the configuration snapshot.
pub fn format_config(
    snapshot: &ConfigSnapshot,
    strategies: &[String],
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(snapshot)
                .map_err(|e| CommandError::OutputFormat(e.to_string()))?;
            value["enabled_strategies"] = serde_json::json!(strategies);
            to_json(&value)
        }
        OutputFormat::Text => {
            let config = &snapshot.current_model_config;
            let mut out = String::new();
            let _ = writeln!(out, "Backend:     {}", snapshot.model_type);
            let _ = writeln!(out, "Agent:       {}", snapshot.default_agent);
            let _ = writeln!(out, "Model:       {}", config.model.as_deref().unwrap_or("(default)"));
            let _ = writeln!(out, "API key:     {}", config.api_key.as_deref().unwrap_or("(unset)"));
            let _ = writeln!(out, "Base URL:    {}", config.base_url.as_deref().unwrap_or("(default)"));
            let strategies = if strategies.is_empty() {
                "(none)".to_string()
            } else {
                strategies.join(", ")
            };
            let _ = writeln!(out, "Strategies:  {strategies}");
            let _ = writeln!(out, "Backends:    {}", snapshot.available_models.join(", "));
            let _ = write!(out, "Agents:      {}", snapshot.available_agents.join(", "));
            Ok(out)
        }
    }
}

/// Formats a configuration update outcome.
pub fn format_update(outcome: &ConfigUpdateOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(outcome),
        OutputFormat::Text => {
            let mut out = format!(
                "{} (backend: {}, agent: {})",
                outcome.message, outcome.model_type, outcome.agent_name
            );
            if let Some(warning) = &outcome.warning {
                let _ = write!(out, "\nWarning: {warning}");
            }
            Ok(out)
        }
    }
}

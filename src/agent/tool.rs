//! Tool types for function-calling.
//!
//! A [`Tool`] is a named text-in/text-out callable the model may invoke
//! mid-conversation. Tools are owned by the
//! [`ToolRegistry`](crate::registry::ToolRegistry) and shared with agents
//! through `Arc` handles; agents never mutate them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AgentError;

/// A callable capability attached to an agent.
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Natural-language description the model uses to decide when to call it.
    fn description(&self) -> &str;

    /// Runs the tool. Side effects are the tool author's responsibility.
    fn invoke(&self, input: &str) -> Result<String, AgentError>;

    /// Function-calling schema: a single free-text `input` argument.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Free-text input for the tool."
                    }
                },
                "required": ["input"],
                "additionalProperties": false
            }),
        }
    }
}

type ToolFn = dyn Fn(&str) -> Result<String, AgentError> + Send + Sync;

/// A [`Tool`] backed by a closure.
pub struct FnTool {
    name: String,
    description: String,
    func: Box<ToolFn>,
}

impl FnTool {
    /// Creates a closure-backed tool.
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> Result<String, AgentError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            func: Box::new(func),
        }
    }

    /// Wraps the tool in an `Arc` for registration.
    #[must_use]
    pub fn shared(self) -> Arc<dyn Tool> {
        Arc::new(self)
    }
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn invoke(&self, input: &str) -> Result<String, AgentError> {
        (self.func)(input)
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match a tool in the agent's set).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

impl ToolCall {
    /// Extracts the free-text input from the call arguments.
    ///
    /// Accepts `{"input": "..."}`, a bare JSON string, or falls back to the
    /// raw argument text for models that ignore the schema.
    #[must_use]
    pub fn input(&self) -> String {
        match serde_json::from_str::<serde_json::Value>(&self.arguments) {
            Ok(serde_json::Value::Object(map)) => map
                .get("input")
                .and_then(serde_json::Value::as_str)
                .map_or_else(String::new, ToString::to_string),
            Ok(serde_json::Value::String(s)) => s,
            _ => self.arguments.clone(),
        }
    }
}

/// The result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (tool output on success, error text on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// The ordered tool set of one agent.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    /// Builds a set from tools in order. A later tool replaces an earlier
    /// one with the same name, keeping the earlier position.
    #[must_use]
    pub fn from_tools<I>(tools: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        let mut set = Self::default();
        for tool in tools {
            set.insert(tool);
        }
        set
    }

    /// Inserts a tool, replacing any tool with the same name.
    pub fn insert(&mut self, tool: Arc<dyn Tool>) {
        if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// The tools in this set.
    #[must_use]
    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Function-calling definitions for every tool.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Tool names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Returns `true` if this set contains no tools.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the number of tools in this set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.tools.len()
    }
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(name: &str, prefix: &'static str) -> Arc<dyn Tool> {
        FnTool::new(name, "echo", move |input| Ok(format!("{prefix}{input}"))).shared()
    }

    #[test]
    fn test_fn_tool_invoke() {
        let tool = echo("Echo", "> ");
        assert_eq!(tool.invoke("hi").unwrap_or_default(), "> hi");
        let def = tool.definition();
        assert_eq!(def.name, "Echo");
        assert_eq!(def.parameters["required"][0], "input");
    }

    #[test]
    fn test_tool_set_last_write_wins_by_name() {
        let set = ToolSet::from_tools([echo("A", "1"), echo("B", "2"), echo("A", "3")]);
        assert_eq!(set.names(), vec!["A", "B"]);
        assert_eq!(set.tools()[0].invoke("x").unwrap_or_default(), "3x");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_tool_call_input_shapes() {
        let call = |arguments: &str| ToolCall {
            id: "c".to_string(),
            name: "T".to_string(),
            arguments: arguments.to_string(),
        };
        assert_eq!(call(r#"{"input":"程序员"}"#).input(), "程序员");
        assert_eq!(call(r#""bug""#).input(), "bug");
        assert_eq!(call("joke").input(), "joke");
        assert_eq!(call("{}").input(), "");
    }
}

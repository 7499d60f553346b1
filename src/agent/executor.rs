//! Tool executor that dispatches model tool calls to an agent's tool set.
//!
//! Failures never abort the loop: an unknown tool, oversized arguments or a
//! tool error all come back as an error [`ToolResult`] the model can read.

use std::collections::HashMap;
use std::sync::Arc;

use super::tool::{Tool, ToolCall, ToolResult, ToolSet};
use crate::error::AgentError;

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// Executes tool calls against a fixed tool set.
pub struct ToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolExecutor {
    /// Creates an executor over the given tools.
    #[must_use]
    pub fn new(tools: &ToolSet) -> Self {
        Self {
            tools: tools
                .tools()
                .iter()
                .map(|t| (t.name().to_string(), Arc::clone(t)))
                .collect(),
        }
    }

    /// Dispatches a tool call to the named tool.
    ///
    /// Validates raw argument size before dispatch.
    #[must_use]
    pub fn execute(&self, call: &ToolCall) -> ToolResult {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return ToolResult {
                tool_call_id: call.id.clone(),
                content: format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
                is_error: true,
            };
        }

        let result = self.tools.get(&call.name).map_or_else(
            || {
                Err(AgentError::ToolExecution {
                    name: call.name.clone(),
                    message: "unknown tool".to_string(),
                })
            },
            |tool| tool.invoke(&call.input()),
        );

        match result {
            Ok(content) => ToolResult {
                tool_call_id: call.id.clone(),
                content,
                is_error: false,
            },
            Err(e) => ToolResult {
                tool_call_id: call.id.clone(),
                content: e.to_string(),
                is_error: true,
            },
        }
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolExecutor").field("tools", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tool::FnTool;

    fn executor() -> ToolExecutor {
        let set = ToolSet::from_tools([
            FnTool::new("Upper", "uppercase", |input| Ok(input.to_uppercase())).shared(),
            FnTool::new("Broken", "always fails", |_| {
                Err(AgentError::ToolExecution {
                    name: "Broken".to_string(),
                    message: "boom".to_string(),
                })
            })
            .shared(),
        ]);
        ToolExecutor::new(&set)
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_execute_known_tool() {
        let result = executor().execute(&call("Upper", r#"{"input":"abc"}"#));
        assert!(!result.is_error);
        assert_eq!(result.content, "ABC");
        assert_eq!(result.tool_call_id, "call_1");
    }

    #[test]
    fn test_unknown_tool() {
        let result = executor().execute(&call("Nope", "{}"));
        assert!(result.is_error);
        assert!(result.content.contains("unknown tool"));
    }

    #[test]
    fn test_tool_failure_is_reported() {
        let result = executor().execute(&call("Broken", "{}"));
        assert!(result.is_error);
        assert!(result.content.contains("boom"));
    }

    #[test]
    fn test_oversized_arguments_rejected() {
        let big = "x".repeat(MAX_TOOL_ARGS_LEN + 1);
        let result = executor().execute(&call("Upper", &big));
        assert!(result.is_error);
        assert!(result.content.contains("too large"));
    }
}

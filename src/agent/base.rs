//! The tool-using base agent.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::agentic_loop::agentic_loop;
use super::executor::ToolExecutor;
use super::message::{ChatRequest, system_message, user_message};
use super::provider::LlmProvider;
use super::tool::ToolSet;
use super::traits::{Agent, AgentRequest, AgentResponse, RunOutcome};
use super::transcript::final_answer;
use crate::config::Options;
use crate::error::AgentError;

/// Step bound when no `max_iterations` option is set.
pub const DEFAULT_MAX_STEPS: usize = 20;

/// Executor state built on first use.
struct Runtime {
    executor: ToolExecutor,
    template: ChatRequest,
}

/// An agent bound to a model handle, a tool set and runtime options.
///
/// Recognised options: `max_iterations` (step bound) and `verbose` (log
/// each tool round at `info`).
pub struct BaseAgent {
    name: String,
    system_prompt: String,
    tools: ToolSet,
    provider: Arc<dyn LlmProvider>,
    options: Options,
    runtime: OnceLock<Runtime>,
}

impl BaseAgent {
    /// Creates an agent. Nothing is built until the first invocation.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        tools: ToolSet,
        provider: Arc<dyn LlmProvider>,
        options: Options,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            tools,
            provider,
            options,
            runtime: OnceLock::new(),
        }
    }

    /// The agent's tools.
    #[must_use]
    pub const fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Options fixed at construction.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    fn runtime(&self) -> &Runtime {
        self.runtime.get_or_init(|| {
            debug!(agent = %self.name, tools = self.tools.len(), "building agent runtime");
            let messages = if self.system_prompt.is_empty() {
                Vec::new()
            } else {
                vec![system_message(&self.system_prompt)]
            };
            Runtime {
                executor: ToolExecutor::new(&self.tools),
                template: ChatRequest {
                    model: self.provider.model().to_string(),
                    messages,
                    temperature: self.provider.temperature(),
                    max_tokens: None,
                    tools: self.tools.definitions(),
                },
            }
        })
    }
}

#[async_trait]
impl Agent for BaseAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider(&self) -> Arc<dyn LlmProvider> {
        Arc::clone(&self.provider)
    }

    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        let runtime = self.runtime();
        let options = Options::layered([&self.options, &request.options]);
        let max_steps = options
            .get_usize("max_iterations")
            .unwrap_or(DEFAULT_MAX_STEPS);
        let verbose = options.get_bool("verbose").unwrap_or(false);

        let mut chat = runtime.template.clone();
        let prefix = chat.messages.len();
        chat.messages.push(user_message(&request.text));

        let result = agentic_loop(
            self.provider.as_ref(),
            &mut chat,
            &runtime.executor,
            max_steps,
            request.observer(),
        )
        .await?;

        let transcript = &chat.messages[prefix..];
        if verbose {
            let tool_rounds = transcript.iter().filter(|m| !m.tool_calls.is_empty()).count();
            info!(
                agent = %self.name,
                steps = result.steps,
                tool_rounds,
                tokens = result.usage.total_tokens,
                "agent run finished"
            );
        }

        let mut output = final_answer(transcript);
        if let RunOutcome::StepLimitReached { max_steps } = result.outcome {
            warn!(agent = %self.name, max_steps, "agent stopped at step bound");
            if output.is_empty() {
                output = format!("Agent stopped after {max_steps} steps without a final answer");
            }
        }

        Ok(AgentResponse {
            output,
            outcome: result.outcome,
        })
    }
}

impl std::fmt::Debug for BaseAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseAgent")
            .field("name", &self.name)
            .field("tools", &self.tools)
            .field("provider", &self.provider.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::Role;
    use crate::agent::mock::{ScriptedProvider, text_response, tool_call_response};
    use crate::agent::tool::FnTool;

    fn jokes() -> ToolSet {
        ToolSet::from_tools([FnTool::new("GetRandomJoke", "joke", |_| {
            Ok("随机笑话A".to_string())
        })
        .shared()])
    }

    #[tokio::test]
    async fn test_invoke_selects_final_turn() {
        let provider = ScriptedProvider::new(|i, _| {
            if i == 0 {
                Ok(tool_call_response("call_0", "GetRandomJoke", "joke"))
            } else {
                Ok(text_response("Thought: 我有笑话了\n最终答案: 随机笑话A"))
            }
        });
        let agent = BaseAgent::new("joke", "tell jokes", jokes(), provider.clone(), Options::new());
        let response = agent
            .invoke(&AgentRequest::new("讲个笑话"))
            .await
            .unwrap_or_else(|e| panic!("invoke failed: {e}"));
        assert_eq!(response.output, "随机笑话A");
        assert_eq!(response.outcome, RunOutcome::Completed);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_user_text_is_sole_initial_turn() {
        let provider = ScriptedProvider::new(|_, request| {
            let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
            assert_eq!(roles, vec![Role::System, Role::User]);
            Ok(text_response("ok"))
        });
        let agent = BaseAgent::new("joke", "sys", jokes(), provider, Options::new());
        let response = agent
            .invoke(&AgentRequest::new("hello"))
            .await
            .unwrap_or_else(|e| panic!("invoke failed: {e}"));
        assert_eq!(response.output, "ok");
    }

    #[tokio::test]
    async fn test_step_bound_from_options_and_call_override() {
        let provider = ScriptedProvider::new(|i, _| {
            Ok(tool_call_response(&format!("call_{i}"), "GetRandomJoke", "joke"))
        });
        let agent = BaseAgent::new(
            "joke",
            "",
            jokes(),
            provider.clone(),
            Options::new().with("max_iterations", 5),
        );

        let response = agent
            .invoke(&AgentRequest::new("loop"))
            .await
            .unwrap_or_else(|e| panic!("invoke failed: {e}"));
        assert_eq!(response.outcome, RunOutcome::StepLimitReached { max_steps: 5 });
        assert_eq!(provider.calls(), 5);
        // Every model turn called a tool, so the last model turn is selected.
        assert_eq!(response.output, "Thought: call GetRandomJoke");

        let request =
            AgentRequest::new("loop").with_options(Options::new().with("max_iterations", 2));
        let response = agent
            .invoke(&request)
            .await
            .unwrap_or_else(|e| panic!("invoke failed: {e}"));
        assert_eq!(response.outcome, RunOutcome::StepLimitReached { max_steps: 2 });
        assert_eq!(provider.calls(), 7);
    }

    #[tokio::test]
    async fn test_runtime_is_memoized() {
        let provider = ScriptedProvider::fixed("ok");
        let agent = BaseAgent::new("joke", "sys", jokes(), provider, Options::new());
        let first: *const Runtime = agent.runtime();
        let _ = agent.invoke(&AgentRequest::new("a")).await;
        let second: *const Runtime = agent.runtime();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let provider = ScriptedProvider::new(|_, _| {
            Err(AgentError::ApiRequest {
                message: "timed out".to_string(),
                status: None,
            })
        });
        let agent = BaseAgent::new("joke", "sys", jokes(), provider, Options::new());
        let result = agent.invoke(&AgentRequest::new("a")).await;
        assert!(matches!(result, Err(AgentError::ApiRequest { .. })));
    }
}

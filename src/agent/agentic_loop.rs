//! Agentic tool-calling loop.
//!
//! Drives the LLM ↔ tool execution round-trip: sends a request to the model,
//! executes any tool calls in the response, appends results, and repeats
//! until the model produces a turn without tool calls or the step bound is
//! reached. Every model turn is kept in the transcript so the final answer
//! can be selected afterwards.

use tracing::debug;

use super::executor::ToolExecutor;
use super::message::{ChatRequest, TokenUsage, assistant_message, tool_message};
use super::provider::LlmProvider;
use super::traits::RunOutcome;
use crate::error::AgentError;
use crate::logging::{CallObserver, observed_chat};

/// How a loop run ended, with usage summed over every model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopResult {
    /// Completion status.
    pub outcome: RunOutcome,
    /// Total token usage.
    pub usage: TokenUsage,
    /// Model calls made.
    pub steps: usize,
}

/// Runs an agentic loop: model → tool calls → tool results → model → …
///
/// One step is one model call. `request.messages` is extended in place with
/// every model turn and tool observation.
///
/// # Arguments
///
/// * `provider` - LLM provider to call.
/// * `request` - Initial chat request (mutated in-place with the transcript).
/// * `executor` - Dispatches tool calls to the agent's tools.
/// * `max_steps` - Bound on model calls; values below 1 are treated as 1.
/// * `observer` - Receives every model request and response.
///
/// # Errors
///
/// Propagates provider errors. Step-bound exhaustion is not an error; it is
/// reported as [`RunOutcome::StepLimitReached`].
pub async fn agentic_loop(
    provider: &dyn LlmProvider,
    request: &mut ChatRequest,
    executor: &ToolExecutor,
    max_steps: usize,
    observer: Option<&dyn CallObserver>,
) -> Result<LoopResult, AgentError> {
    let max_steps = max_steps.max(1);
    let mut usage = TokenUsage::default();

    for step in 0..max_steps {
        let response = observed_chat(provider, request, observer).await?;
        usage.accumulate(response.usage);

        request
            .messages
            .push(assistant_message(&response.content, response.tool_calls.clone()));

        if response.tool_calls.is_empty() {
            debug!(step, "agentic loop completed with final text response");
            return Ok(LoopResult {
                outcome: RunOutcome::Completed,
                usage,
                steps: step + 1,
            });
        }

        debug!(
            step,
            tool_count = response.tool_calls.len(),
            "executing tool calls"
        );

        for call in &response.tool_calls {
            let result = executor.execute(call);
            debug!(
                tool = %call.name,
                call_id = %call.id,
                is_error = result.is_error,
                "tool execution complete"
            );
            request
                .messages
                .push(tool_message(&result.tool_call_id, &result.content));
        }
    }

    debug!(max_steps, "agentic loop hit the step bound");
    Ok(LoopResult {
        outcome: RunOutcome::StepLimitReached { max_steps },
        usage,
        steps: max_steps,
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::{Role, system_message, user_message};
    use crate::agent::mock::{ScriptedProvider, text_response, tool_call_response};
    use crate::agent::tool::{FnTool, ToolSet};

    fn joke_executor() -> ToolExecutor {
        let set = ToolSet::from_tools([FnTool::new("GetRandomJoke", "joke", |_| {
            Ok("为什么程序员总是分不清万圣节和圣诞节？因为 Oct 31 == Dec 25".to_string())
        })
        .shared()]);
        ToolExecutor::new(&set)
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "mock-model".to_string(),
            messages: vec![system_message("You tell jokes."), user_message("讲个笑话")],
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    /// Tool calls on the first `rounds` calls, then a final answer.
    fn tool_rounds(rounds: usize) -> std::sync::Arc<ScriptedProvider> {
        ScriptedProvider::new(move |i, _| {
            if i < rounds {
                Ok(tool_call_response(&format!("call_{i}"), "GetRandomJoke", "joke"))
            } else {
                Ok(text_response("Final Answer: 这是一个笑话"))
            }
        })
    }

    #[tokio::test]
    async fn test_agentic_loop_single_tool_round() {
        let provider = tool_rounds(1);
        let mut req = request();
        let result = agentic_loop(provider.as_ref(), &mut req, &joke_executor(), 10, None)
            .await
            .unwrap_or_else(|e| panic!("loop failed: {e}"));

        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(result.steps, 2);
        assert_eq!(provider.calls(), 2);
        // system, user, assistant(tool call), tool, assistant(final)
        assert_eq!(req.messages.len(), 5);
        assert_eq!(req.messages[3].role, Role::Tool);
        assert!(req.messages[3].content.contains("Oct 31"));
        assert!(req.messages[4].is_final_model_turn());
    }

    #[tokio::test]
    async fn test_agentic_loop_multiple_rounds() {
        let provider = tool_rounds(3);
        let mut req = request();
        let result = agentic_loop(provider.as_ref(), &mut req, &joke_executor(), 10, None)
            .await
            .unwrap_or_else(|e| panic!("loop failed: {e}"));

        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(provider.calls(), 4);
        assert_eq!(result.usage.total_tokens, 15);
    }

    #[tokio::test]
    async fn test_agentic_loop_step_bound_is_not_an_error() {
        let provider = tool_rounds(100);
        let mut req = request();
        let result = agentic_loop(provider.as_ref(), &mut req, &joke_executor(), 3, None)
            .await
            .unwrap_or_else(|e| panic!("loop failed: {e}"));

        assert_eq!(result.outcome, RunOutcome::StepLimitReached { max_steps: 3 });
        assert_eq!(provider.calls(), 3);
        assert!(result.outcome.is_error());
    }

    #[tokio::test]
    async fn test_agentic_loop_zero_bound_still_calls_once() {
        let provider = tool_rounds(0);
        let mut req = request();
        let result = agentic_loop(provider.as_ref(), &mut req, &joke_executor(), 0, None)
            .await
            .unwrap_or_else(|e| panic!("loop failed: {e}"));
        assert_eq!(result.outcome, RunOutcome::Completed);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_tool_error_becomes_observation() {
        let provider = ScriptedProvider::new(|i, _| {
            if i == 0 {
                Ok(tool_call_response("call_0", "Missing", "x"))
            } else {
                Ok(text_response("recovered"))
            }
        });
        let mut req = request();
        let result = agentic_loop(provider.as_ref(), &mut req, &joke_executor(), 5, None)
            .await
            .unwrap_or_else(|e| panic!("loop failed: {e}"));
        assert_eq!(result.outcome, RunOutcome::Completed);
        assert!(req.messages[3].content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = ScriptedProvider::new(|_, _| {
            Err(AgentError::ApiRequest {
                message: "connection refused".to_string(),
                status: None,
            })
        });
        let mut req = request();
        let result = agentic_loop(provider.as_ref(), &mut req, &joke_executor(), 5, None).await;
        assert!(matches!(result, Err(AgentError::ApiRequest { .. })));
    }
}

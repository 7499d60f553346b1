//! Enhancement strategy chain.
//!
//! Strategies post-process an agent's answer. The [`StrategyManager`] holds
//! them by name and applies the ones enabled in settings, in order. The
//! built-in [`ReflectionStrategy`] runs the bounded reflect-and-revise
//! machine in [`graph`].

pub mod graph;
pub mod manager;
pub mod reflection;
pub mod strategy;

use std::sync::Arc;

use async_trait::async_trait;

pub use graph::{Critic, ReflectionGraph, ReflectionOutcome, ReflectionState, ReflectionStep};
pub use manager::StrategyManager;
pub use reflection::{REFLECTION, ReflectionStrategy};
pub use strategy::{EnhancedOutput, EnhancementStrategy, StageInput};

use crate::agent::{Agent, AgentRequest, AgentResponse, LlmProvider};
use crate::error::AgentError;

/// An agent whose invocations go through the strategy chain.
///
/// Requests with `enhance == false` reach the inner agent untouched, which
/// is how the reflection machine runs a wrapped agent without recursing.
pub struct EnhancedAgent {
    inner: Arc<dyn Agent>,
    strategies: Arc<StrategyManager>,
}

impl EnhancedAgent {
    /// Wraps `inner` with the chain held by `strategies`.
    #[must_use]
    pub fn new(inner: Arc<dyn Agent>, strategies: Arc<StrategyManager>) -> Self {
        Self { inner, strategies }
    }
}

#[async_trait]
impl Agent for EnhancedAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn provider(&self) -> Arc<dyn LlmProvider> {
        self.inner.provider()
    }

    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        if !request.enhance {
            return self.inner.invoke(request).await;
        }
        let enhanced = self.strategies.apply(self, request).await?;
        Ok(AgentResponse {
            output: enhanced.output,
            outcome: enhanced.outcome,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::mock::{FixedAgent, ScriptedProvider, text_response};
    use crate::config::{Options, Settings};

    #[tokio::test]
    async fn test_wrapped_agent_reflection_does_not_recurse() {
        let provider = ScriptedProvider::new(|i, _| {
            Ok(text_response(if i == 0 {
                "是否需要改进: 是"
            } else {
                "随机笑话A（改进版）"
            }))
        });
        let inner = Arc::new(FixedAgent::new("随机笑话A", provider.clone()));
        let settings = Settings::builder()
            .strategies([REFLECTION])
            .strategy_block(
                REFLECTION,
                Options::new().with("enable", true).with("max_iterations", 1),
            )
            .shared();
        let strategies = Arc::new(StrategyManager::new(settings));
        strategies.register(REFLECTION, Arc::new(ReflectionStrategy::new(Options::new())));

        let agent = EnhancedAgent::new(inner.clone(), strategies);
        let response = agent
            .invoke(&AgentRequest::new("讲个笑话"))
            .await
            .unwrap_or_else(|e| panic!("invoke failed: {e}"));

        assert_eq!(response.output, "随机笑话A（改进版）");
        assert_eq!(inner.invocations(), 1);
        assert_eq!(provider.calls(), 2);
        assert_eq!(agent.name(), "fixed");
    }

    #[tokio::test]
    async fn test_wrapper_keeps_step_limit_outcome() {
        let exhausted = crate::agent::RunOutcome::StepLimitReached { max_steps: 2 };
        let inner = Arc::new(
            FixedAgent::new("partial", ScriptedProvider::fixed("unused")).with_outcome(exhausted),
        );
        let strategies = Arc::new(StrategyManager::new(Settings::builder().shared()));
        let agent = EnhancedAgent::new(inner, strategies);

        let response = agent
            .invoke(&AgentRequest::new("q"))
            .await
            .unwrap_or_else(|e| panic!("invoke failed: {e}"));
        assert_eq!(response.output, "partial");
        assert_eq!(response.outcome, exhausted);
    }
}

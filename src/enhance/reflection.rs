//! Reflection strategy: run the reflect-and-revise machine over an agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::graph::{Critic, DEFAULT_MAX_ITERATIONS, ReflectionGraph, ReflectionOutcome};
use super::strategy::{EnhancedOutput, EnhancementStrategy, StageInput};
use crate::agent::reflection::{ReflectionAgent, VerdictClassifier};
use crate::agent::Agent;
use crate::config::Options;
use crate::error::AgentError;
use crate::logging::ReflectionRecord;

/// Registry name of the reflection strategy.
pub const REFLECTION: &str = "reflection";

/// Wraps an agent in the reflect-and-revise loop.
///
/// Config keys: `enable`, `max_iterations` (default 2), `log_reflection`
/// (default `true`). Without an injected critic, a [`ReflectionAgent`] is
/// built on the target agent's own model handle.
#[derive(Default)]
pub struct ReflectionStrategy {
    config: Options,
    critic: Option<Arc<dyn Critic>>,
    classifier: Option<Arc<dyn VerdictClassifier>>,
}

impl ReflectionStrategy {
    /// Creates the strategy with local configuration.
    #[must_use]
    pub fn new(config: Options) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Uses a fixed critic instead of one built per call.
    #[must_use]
    pub fn with_critic(mut self, critic: Arc<dyn Critic>) -> Self {
        self.critic = Some(critic);
        self
    }

    /// Uses a custom verdict classifier for built critics.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn VerdictClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    fn critic_for(&self, agent: &dyn Agent) -> Arc<dyn Critic> {
        if let Some(critic) = &self.critic {
            return Arc::clone(critic);
        }
        let reflection = ReflectionAgent::new(agent.provider());
        match &self.classifier {
            Some(classifier) => Arc::new(reflection.with_classifier(Arc::clone(classifier))),
            None => Arc::new(reflection),
        }
    }

    fn metadata(outcome: &ReflectionOutcome) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert(
            REFLECTION.to_string(),
            json!({
                "iterations": outcome.iterations,
                "reflection": outcome.critique,
                "original_output": outcome.original_output,
            }),
        );
        metadata
    }
}

impl std::fmt::Debug for ReflectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionStrategy")
            .field("config", &self.config)
            .field("critic", &self.critic.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EnhancementStrategy for ReflectionStrategy {
    fn name(&self) -> &str {
        REFLECTION
    }

    fn local_config(&self) -> &Options {
        &self.config
    }

    async fn enhance(
        &self,
        agent: &dyn Agent,
        input: &StageInput<'_>,
        config: &Options,
    ) -> Result<EnhancedOutput, AgentError> {
        let max_iterations = config
            .get_usize("max_iterations")
            .unwrap_or(DEFAULT_MAX_ITERATIONS);
        let critic = self.critic_for(agent);
        let seed = input.previous.map(EnhancedOutput::to_response);

        let outcome = match ReflectionGraph::new(agent, critic.as_ref(), max_iterations)
            .run(input.request, seed)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    agent = agent.name(),
                    error = %e,
                    "reflection failed, falling back to plain answer"
                );
                return Ok(input.current_response(agent).await?.into());
            }
        };

        if config.get_bool("log_reflection").unwrap_or(true) {
            info!(
                agent = agent.name(),
                iterations = outcome.iterations,
                "reflection applied"
            );
            if let Some(observer) = input.request.observer() {
                observer.on_reflection(&ReflectionRecord {
                    iterations: outcome.iterations,
                    original_output: &outcome.original_output,
                    critique: &outcome.critique,
                    final_output: &outcome.output,
                });
            }
        }

        Ok(EnhancedOutput {
            metadata: Self::metadata(&outcome),
            outcome: outcome.run_outcome,
            output: outcome.output,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::agent::mock::{FixedAgent, ScriptedProvider, text_response};
    use crate::agent::AgentRequest;
    use crate::logging::CallObserver;

    fn enabled(max_iterations: usize) -> Options {
        Options::new()
            .with("enable", true)
            .with("max_iterations", max_iterations)
    }

    #[derive(Default)]
    struct Recorder {
        reflections: Mutex<Vec<(usize, String)>>,
    }

    impl CallObserver for Recorder {
        fn on_reflection(&self, record: &ReflectionRecord<'_>) {
            if let Ok(mut seen) = self.reflections.lock() {
                seen.push((record.iterations, record.final_output.to_string()));
            }
        }
    }

    #[tokio::test]
    async fn test_reflection_over_agent_provider() {
        // The reflection agent shares the target agent's model handle.
        let provider = ScriptedProvider::new(|i, _| {
            Ok(text_response(match i {
                0 => "评估结果: 一般\n是否需要改进: 是\n改进建议: 不完整",
                _ => "随机笑话A（改进版）",
            }))
        });
        let agent = FixedAgent::new("随机笑话A", provider.clone());
        let recorder = Arc::new(Recorder::default());
        let request = AgentRequest::new("讲个笑话").with_observer(recorder.clone());
        let config = enabled(1);

        let out = ReflectionStrategy::new(config.clone())
            .enhance(&agent, &StageInput { request: &request, previous: None }, &config)
            .await
            .unwrap_or_else(|e| panic!("enhance failed: {e}"));

        assert_eq!(out.output, "随机笑话A（改进版）");
        assert_eq!(out.metadata["reflection"]["iterations"], 1);
        assert_eq!(out.metadata["reflection"]["original_output"], "随机笑话A");
        assert_eq!(provider.calls(), 2);
        let seen = recorder.reflections.lock().map(|v| v.clone()).unwrap_or_default();
        assert_eq!(seen, vec![(1, "随机笑话A（改进版）".to_string())]);
    }

    #[tokio::test]
    async fn test_log_reflection_disabled() {
        let agent = FixedAgent::new("a", ScriptedProvider::fixed("是否需要改进: 否"));
        let recorder = Arc::new(Recorder::default());
        let request = AgentRequest::new("q").with_observer(recorder.clone());
        let config = enabled(2).with("log_reflection", false);

        let out = ReflectionStrategy::new(Options::new())
            .enhance(&agent, &StageInput { request: &request, previous: None }, &config)
            .await
            .unwrap_or_else(|e| panic!("enhance failed: {e}"));
        assert_eq!(out.output, "a");
        assert!(recorder.reflections.lock().map(|v| v.is_empty()).unwrap_or(false));
    }

    #[tokio::test]
    async fn test_critic_failure_falls_back_to_plain_answer() {
        let provider = ScriptedProvider::new(|_, _| {
            Err(AgentError::ApiRequest {
                message: "429 rate limit".to_string(),
                status: Some(429),
            })
        });
        let agent = FixedAgent::new("plain", provider);
        let request = AgentRequest::new("q");
        let config = enabled(2);

        let out = ReflectionStrategy::new(Options::new())
            .enhance(&agent, &StageInput { request: &request, previous: None }, &config)
            .await
            .unwrap_or_else(|e| panic!("enhance failed: {e}"));
        assert_eq!(out.output, "plain");
        assert!(out.metadata.is_empty());
        // One run inside the machine, one for the fallback.
        assert_eq!(agent.invocations(), 2);
    }

    #[tokio::test]
    async fn test_previous_stage_seeds_execution() {
        let agent = FixedAgent::new("unused", ScriptedProvider::fixed("是否需要改进: 否"));
        let request = AgentRequest::new("q");
        let previous = EnhancedOutput::plain("from earlier stage");
        let config = enabled(2);

        let out = ReflectionStrategy::new(Options::new())
            .enhance(
                &agent,
                &StageInput { request: &request, previous: Some(&previous) },
                &config,
            )
            .await
            .unwrap_or_else(|e| panic!("enhance failed: {e}"));
        assert_eq!(out.output, "from earlier stage");
        assert_eq!(agent.invocations(), 0);
    }

    #[test]
    fn test_description() {
        let strategy = ReflectionStrategy::new(Options::new());
        assert_eq!(strategy.description(&Options::new()), "Strategy: reflection");
        let config = Options::new().with("description", "self-critique");
        assert_eq!(strategy.description(&config), "self-critique");
    }
}

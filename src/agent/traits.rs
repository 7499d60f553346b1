//! Agent trait definition.
//!
//! Every runnable agent, plain or enhanced, implements [`Agent`]: a single
//! text-in/text-out `invoke` over a model handle.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use super::provider::LlmProvider;
use crate::config::Options;
use crate::error::AgentError;
use crate::logging::CallObserver;

/// A single invocation request.
#[derive(Clone)]
pub struct AgentRequest {
    /// User input text.
    pub text: String,
    /// Per-call runtime option overrides (e.g. `max_iterations`).
    pub options: Options,
    /// Receives model-call events for this invocation.
    pub observer: Option<Arc<dyn CallObserver>>,
    /// Whether enhancement strategies may wrap this call.
    pub enhance: bool,
}

impl AgentRequest {
    /// A request with no overrides and enhancement allowed.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Options::new(),
            observer: None,
            enhance: true,
        }
    }

    /// Attaches a call observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Sets per-call option overrides.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Copy of this request with enhancement disabled.
    #[must_use]
    pub fn without_enhancement(&self) -> Self {
        Self {
            enhance: false,
            ..self.clone()
        }
    }

    /// The attached observer as a trait object reference.
    #[must_use]
    pub fn observer(&self) -> Option<&dyn CallObserver> {
        self.observer.as_deref()
    }
}

impl fmt::Debug for AgentRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRequest")
            .field("text", &self.text)
            .field("options", &self.options)
            .field("observer", &self.observer.is_some())
            .field("enhance", &self.enhance)
            .finish()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The model produced a turn with no further tool call.
    #[default]
    Completed,
    /// The step bound was reached first.
    StepLimitReached {
        /// The bound that was hit.
        max_steps: usize,
    },
}

impl RunOutcome {
    /// `true` when the run did not complete normally.
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::StepLimitReached { .. })
    }
}

/// Response from an agent invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentResponse {
    /// Final answer text.
    pub output: String,
    /// Completion status.
    pub outcome: RunOutcome,
}

/// Trait implemented by all agents.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &str;

    /// The model handle this agent runs on.
    fn provider(&self) -> Arc<dyn LlmProvider>;

    /// Runs the agent on one request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the model backend fails. Tool failures
    /// and step-bound exhaustion are not errors.
    async fn invoke(&self, request: &AgentRequest) -> Result<AgentResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_without_enhancement_keeps_fields() {
        let request =
            AgentRequest::new("讲个笑话").with_options(Options::new().with("max_iterations", 3));
        let plain = request.without_enhancement();
        assert!(request.enhance);
        assert!(!plain.enhance);
        assert_eq!(plain.text, "讲个笑话");
        assert_eq!(plain.options.get_usize("max_iterations"), Some(3));
    }

    #[test]
    fn test_run_outcome_serialization() {
        let json = serde_json::to_value(RunOutcome::StepLimitReached { max_steps: 5 })
            .unwrap_or_default();
        assert_eq!(json["status"], "step_limit_reached");
        assert_eq!(json["max_steps"], 5);
        assert!(!RunOutcome::Completed.is_error());
    }
}

//! The enhancement strategy contract.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::agent::{Agent, AgentRequest, AgentResponse, RunOutcome};
use crate::config::Options;
use crate::error::AgentError;

/// Result of a strategy stage, or of the whole chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnhancedOutput {
    /// Answer text.
    pub output: String,
    /// Strategy-specific metadata keyed by strategy.
    pub metadata: Map<String, Value>,
    /// How the underlying agent run ended.
    pub outcome: RunOutcome,
}

impl EnhancedOutput {
    /// Output with empty metadata from a completed run.
    #[must_use]
    pub fn plain(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    /// The answer as an agent response, dropping metadata.
    #[must_use]
    pub fn to_response(&self) -> AgentResponse {
        AgentResponse {
            output: self.output.clone(),
            outcome: self.outcome,
        }
    }
}

impl From<AgentResponse> for EnhancedOutput {
    fn from(response: AgentResponse) -> Self {
        Self {
            output: response.output,
            metadata: Map::new(),
            outcome: response.outcome,
        }
    }
}

/// What a stage receives: the original request and the previous stage's
/// result, `None` for the first applied stage.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    /// The caller's request.
    pub request: &'a AgentRequest,
    /// Output of the previous successful stage.
    pub previous: Option<&'a EnhancedOutput>,
}

impl StageInput<'_> {
    /// The previous stage's answer, or a fresh plain invocation of `agent`.
    ///
    /// # Errors
    ///
    /// Propagates the agent error.
    pub async fn current_response(&self, agent: &dyn Agent) -> Result<AgentResponse, AgentError> {
        match self.previous {
            Some(previous) => Ok(previous.to_response()),
            None => agent.invoke(&self.request.without_enhancement()).await,
        }
    }
}

/// A pluggable transformation of an agent's answer.
#[async_trait]
pub trait EnhancementStrategy: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Strategy-local configuration, the highest-precedence layer.
    fn local_config(&self) -> &Options;

    /// Whether the strategy applies under the merged configuration.
    fn is_enabled(&self, config: &Options) -> bool {
        config.enabled()
    }

    /// Human-readable description.
    fn description(&self, config: &Options) -> String {
        config
            .get_str("description")
            .map_or_else(|| format!("Strategy: {}", self.name()), ToString::to_string)
    }

    /// Runs the strategy.
    ///
    /// `config` is the merged configuration for this strategy.
    ///
    /// # Errors
    ///
    /// Any error skips this stage; the chain continues without it.
    async fn enhance(
        &self,
        agent: &dyn Agent,
        input: &StageInput<'_>,
        config: &Options,
    ) -> Result<EnhancedOutput, AgentError>;
}

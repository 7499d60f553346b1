//! Scripted providers and agents for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::LlmProvider;
use super::tool::ToolCall;
use super::traits::{Agent, AgentRequest, AgentResponse, RunOutcome};
use crate::error::AgentError;

type Script = dyn Fn(usize, &ChatRequest) -> Result<ChatResponse, AgentError> + Send + Sync;

/// Provider whose replies come from a closure over `(call index, request)`.
pub struct ScriptedProvider {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    script: Box<Script>,
}

impl ScriptedProvider {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(usize, &ChatRequest) -> Result<ChatResponse, AgentError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    /// Always answers with the same text.
    pub fn fixed(text: &'static str) -> Arc<Self> {
        Self::new(move |_, _| Ok(text_response(text)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Last user message of every request, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(last) = request.messages.last() {
            self.prompts
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(last.content.clone());
        }
        (self.script)(index, request)
    }
}

pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        content: text.to_string(),
        usage: TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        },
        tool_calls: Vec::new(),
        finish_reason: Some("stop".to_string()),
    }
}

pub fn tool_call_response(id: &str, tool: &str, input: &str) -> ChatResponse {
    ChatResponse {
        content: format!("Thought: call {tool}"),
        usage: TokenUsage::default(),
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: tool.to_string(),
            arguments: serde_json::json!({ "input": input }).to_string(),
        }],
        finish_reason: Some("tool_calls".to_string()),
    }
}

/// Agent that echoes a fixed output and counts invocations.
pub struct FixedAgent {
    pub output: String,
    pub provider: Arc<dyn LlmProvider>,
    outcome: RunOutcome,
    invocations: AtomicUsize,
}

impl FixedAgent {
    pub fn new(output: &str, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            output: output.to_string(),
            provider,
            outcome: RunOutcome::Completed,
            invocations: AtomicUsize::new(0),
        }
    }

    /// Reports `outcome` from every invocation.
    pub fn with_outcome(mut self, outcome: RunOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for FixedAgent {
    fn name(&self) -> &str {
        "fixed"
    }

    fn provider(&self) -> Arc<dyn LlmProvider> {
        Arc::clone(&self.provider)
    }

    async fn invoke(&self, _request: &AgentRequest) -> Result<AgentResponse, AgentError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(AgentResponse {
            output: self.output.clone(),
            outcome: self.outcome,
        })
    }
}
